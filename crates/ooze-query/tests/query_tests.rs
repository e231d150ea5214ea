//! End-to-end tests of the facade against small in-memory sources.

use anyhow::Result;
use ooze_query::{
    like, Connectivity, DataSource, Element, Fields, Ooze, OozeError, QueryCollection,
    QueryObject, TransactionIds, TypeTag,
};

const INSTANCE: TypeTag = TypeTag::named("Instance");
const PORT: TypeTag = TypeTag::named("Port");
const EVENT: TypeTag = TypeTag::named("Event");

// ============================================================================
// Fixtures
// ============================================================================

/// `top` with children `inst1..inst12`; `inst2.out` drives `inst1.a`.
struct Design {
    records: Vec<QueryObject>,
}

impl Design {
    fn new() -> Self {
        let mut records = vec![instance("top", "top")];
        for i in 1..=12 {
            let path = format!("top.inst{i}");
            let definition = if i % 2 == 0 { "mod2" } else { "mod1" };
            records.push(instance(&path, definition));
            records.push(port(&format!("{path}.a"), "input"));
            records.push(port(&format!("{path}.out"), "output"));
        }
        Self { records }
    }
}

fn instance(path: &str, definition: &str) -> QueryObject {
    QueryObject::builder(INSTANCE)
        .key(path)
        .field("path", path)
        .field("name", path.rsplit('.').next().unwrap_or(path))
        .field("definition", definition)
        .build()
}

fn port(path: &str, direction: &str) -> QueryObject {
    QueryObject::builder(PORT)
        .key(path)
        .field("path", path)
        .field("direction", direction)
        .build()
}

impl DataSource for Design {
    fn name(&self) -> &str {
        "design"
    }

    fn provides(&self) -> Vec<TypeTag> {
        vec![INSTANCE, PORT]
    }

    fn select(&self, tags: &[TypeTag]) -> ooze_query::Result<Vec<QueryObject>> {
        Ok(self
            .records
            .iter()
            .filter(|r| tags.iter().any(|t| r.tag().is(t)))
            .cloned()
            .collect())
    }

    fn connectivity(&self) -> Option<&dyn Connectivity> {
        Some(self)
    }
}

impl Connectivity for Design {
    fn drivers(&self, key: &str) -> Vec<QueryObject> {
        if key == "top.inst1.a" {
            vec![instance("top.inst2", "mod2")]
        } else {
            Vec::new()
        }
    }
}

struct Events(Vec<QueryObject>);

impl DataSource for Events {
    fn name(&self) -> &str {
        "events"
    }

    fn provides(&self) -> Vec<TypeTag> {
        vec![EVENT]
    }

    fn select(&self, _tags: &[TypeTag]) -> ooze_query::Result<Vec<QueryObject>> {
        Ok(self.0.clone())
    }
}

fn design() -> Result<Ooze> {
    let mut ooze = Ooze::new();
    ooze.attach(Design::new())?;
    Ok(ooze)
}

// ============================================================================
// Selection and filtering
// ============================================================================

#[test]
fn test_select_and_where_by_field() -> Result<()> {
    let ooze = design()?;
    let instances = ooze.select(&[INSTANCE])?;
    assert_eq!(instances.len(), 13);

    let mod1 = instances.where_eq("definition", "mod1")?;
    assert_eq!(mod1.len(), 6);

    let both = ooze.select(&[INSTANCE, PORT])?;
    assert_eq!(both.len(), 13 + 24);
    Ok(())
}

#[test]
fn test_like_finds_two_digit_instances() -> Result<()> {
    let ooze = design()?;
    let instances = ooze.select(&[INSTANCE])?;
    let hit = instances.filter(Fields::new().with("name", like(r"inst\d{2,}")?))?;
    assert_eq!(hit.len(), 3);

    let twelve = instances.filter(like(r"inst12$")?)?;
    assert_eq!(twelve.str("path")?, "top.inst12");
    Ok(())
}

#[test]
fn test_projection_then_bind() -> Result<()> {
    let ooze = design()?;
    let paths = ooze.select(&[INSTANCE])?.project(&["path"])?;
    assert!(paths.get(3)?.as_object().is_some_and(|o| o.fields().len() == 1));

    let bound = ooze.bind(&ooze.object([("path", "top.inst3")]), &INSTANCE)?;
    assert_eq!(bound.str("definition")?, "mod1");

    let port = ooze.bind(&ooze.object([("path", "top.inst3.a")]), &PORT)?;
    assert_eq!(port.str("direction")?, "input");

    assert!(matches!(
        ooze.bind(&ooze.object([("path", "top.inst3")]), &PORT),
        Err(OozeError::Bind { matches: 0, .. })
    ));
    Ok(())
}

#[test]
fn test_inside_selects_subtree() -> Result<()> {
    let ooze = design()?;
    let inst1 = ooze.select(&[INSTANCE])?.where_eq("path", "top.inst1")?;
    let under = ooze.select(&[INSTANCE, PORT])?.filter(ooze.inside(&inst1))?;
    let keys: Vec<_> = under.iter().filter_map(Element::key).collect();
    assert_eq!(keys, vec!["top.inst1", "top.inst1.a", "top.inst1.out"]);
    Ok(())
}

#[test]
fn test_source_and_source_of() -> Result<()> {
    let ooze = design()?;
    let a = ooze.select(&[PORT])?.where_eq("path", "top.inst1.a")?;

    let driver = a.map(ooze.source())?;
    assert_eq!(driver.str("path")?, "top.inst2");

    let drivers = ooze.select(&[INSTANCE])?.filter(ooze.source_of(&a))?;
    assert_eq!(drivers.key()?, Some("top.inst2"));

    let undriven = ooze.select(&[PORT])?.where_eq("path", "top.inst5.a")?;
    assert!(undriven.map(ooze.source()).is_err());
    Ok(())
}

// ============================================================================
// Sequences and transactions
// ============================================================================

#[test]
fn test_two_step_chains_become_transactions() -> Result<()> {
    let records = (0..100)
        .map(|i| {
            QueryObject::builder(EVENT)
                .field("time", i as i64)
                .field("value", i as i64)
                .build()
        })
        .collect();
    let mut ooze = Ooze::new();
    ooze.attach(Events(records))?;

    let events = ooze.select(&[EVENT])?;
    let next = |a: &Element, b: &Element| -> ooze_query::Result<bool> {
        Ok(a.int("value")? + 1 == b.int("value")?)
    };
    let chains = events.seq(&events, next, None)?.seq(&events, next, None)?;
    assert_eq!(chains.len(), 98);

    let mut ids = TransactionIds::starting_at(0);
    let txs = chains.transactions(&mut ids)?;
    let t42 = txs.get(42)?;
    assert_eq!(t42.int("id")?, 42);
    assert_eq!(t42.int("duration")?, 2);
    assert_eq!(t42.as_chain().map(QueryCollection::len), Some(3));

    let windowed = events.seq(&events, next, Some(2))?;
    assert_eq!(windowed.len(), 99);
    Ok(())
}
