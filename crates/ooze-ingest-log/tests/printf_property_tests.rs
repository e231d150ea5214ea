use ooze_ingest_log::{LogParser, PrintfParser};
use ooze_query::Value;
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn display_output_parses_back(
        time in 0i64..1_000_000_000,
        value in any::<u32>(),
        count in 0i64..100_000,
        module in "[a-z_][a-z0-9_]{0,6}(\\.[a-z_][a-z0-9_]{0,6}){0,3}",
        prefix in "[A-Z ]{0,8}",
    ) {
        let parser = PrintfParser::new("@%t %m: data=0x%08X count=%d", &["module", "value", "count"]).unwrap();
        let line = format!("{prefix}@{time} {module}: data=0x{value:08X} count={count}");
        let record = parser.parse(&line).unwrap();
        prop_assert_eq!(record.time(), time);
        prop_assert_eq!(record.get("module"), Some(&Value::from(module.as_str())));
        prop_assert_eq!(record.get("value"), Some(&Value::Int(value as i64)));
        prop_assert_eq!(record.get("count"), Some(&Value::Int(count)));
    }
}
