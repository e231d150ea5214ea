use ooze_ingest_vcd::{get_value, pre_value, VcdSource};
use ooze_query::{QueryCollection, QueryObject};
use proptest::prelude::*;

fn dump(changes: &[(u64, u8)]) -> String {
    let mut text = String::from("$scope module top $end\n$var wire 8 ! bus $end\n$upscope $end\n$enddefinitions $end\n");
    for (time, value) in changes {
        text.push_str(&format!("#{time}\nb{value:b} !\n"));
    }
    text
}

fn arb_changes() -> impl Strategy<Value = Vec<(u64, u8)>> {
    prop::collection::vec((1u64..10, any::<u8>()), 1..24).prop_map(|steps| {
        let mut now = 0;
        steps
            .into_iter()
            .map(|(gap, value)| {
                now += gap;
                (now, value)
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn get_value_is_last_change_at_or_before(changes in arb_changes(), at in 0u64..250) {
        let vcd = VcdSource::from_text("prop.vcd", &dump(&changes)).unwrap();
        let wave = vcd.waveform();
        let bus = QueryCollection::from_objects([QueryObject::from_mapping([("path", "top.bus")])]);

        let expected = changes.iter().rev().find(|(t, _)| *t <= at);
        match (expected, bus.map(get_value(&wave, at))) {
            (Some((t, v)), Ok(found)) => {
                prop_assert_eq!(found.int("time").unwrap(), *t as i64);
                prop_assert_eq!(found.int("value").unwrap(), *v as i64);
            }
            (None, Err(_)) => {}
            (expected, found) => prop_assert!(false, "expected {:?}, got {:?}", expected, found.map(|f| f.to_string())),
        }
    }

    #[test]
    fn pre_value_walks_changes_backwards(changes in arb_changes()) {
        let vcd = VcdSource::from_text("prop.vcd", &dump(&changes)).unwrap();
        let wave = vcd.waveform();
        let bus = QueryCollection::from_objects([QueryObject::from_mapping([("path", "top.bus")])]);

        let mut current = bus.map(get_value(&wave, u64::MAX)).unwrap();
        for (time, _) in changes.iter().rev().skip(1) {
            current = current.map(pre_value(&wave)).unwrap();
            prop_assert_eq!(current.int("time").unwrap(), *time as i64);
        }
        prop_assert!(current.map(pre_value(&wave)).is_err());
    }
}
