//! Transactions: identified, timed views over a completed chain.

use std::fmt;

use crate::collection::{Element, QueryCollection};
use crate::error::{OozeError, Result};
use crate::object::{QueryObject, TypeTag};

pub const TRANSACTION: TypeTag = TypeTag::named("Transaction");

/// A chain plus a caller-assigned id and its time span.
///
/// The record exposes `id`, `start`, `end` and `duration`
/// (`time(last) - time(first)`), so transactions filter and join like any
/// other element.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    id: u64,
    duration: i64,
    record: QueryObject,
    chain: QueryCollection,
}

impl Transaction {
    pub fn from_chain(id: u64, chain: QueryCollection) -> Result<Self> {
        let (Some(first), Some(last)) = (chain.first(), chain.last()) else {
            return Err(OozeError::Shape {
                expected: "a non-empty chain",
                len: 0,
            });
        };
        let start = first.time()?;
        let end = last.time()?;
        for element in chain.iter() {
            element.time()?;
        }

        let record = QueryObject::builder(TRANSACTION)
            .key(id.to_string())
            .field("id", id as i64)
            .field("start", start)
            .field("end", end)
            .field("duration", end - start)
            .build();
        Ok(Self {
            id,
            duration: end - start,
            record,
            chain,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn duration(&self) -> i64 {
        self.duration
    }

    pub fn record(&self) -> &QueryObject {
        &self.record
    }

    pub fn chain(&self) -> &QueryCollection {
        &self.chain
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.record, self.chain)
    }
}

/// Monotonically increasing transaction id source.
#[derive(Debug, Clone, Default)]
pub struct TransactionIds {
    next: u64,
}

impl TransactionIds {
    pub fn starting_at(first: u64) -> Self {
        Self { next: first }
    }

    pub fn next_id(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }
}

impl Iterator for TransactionIds {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        Some(self.next_id())
    }
}

impl QueryCollection {
    /// Wraps every chain into a transaction, drawing ids from `ids` in order.
    pub fn transactions(&self, ids: &mut TransactionIds) -> Result<QueryCollection> {
        self.map(|element| {
            let chain = element.as_chain().cloned().unwrap_or_else(|| {
                QueryCollection::new(vec![element.clone()])
            });
            Ok(Element::Transaction(Transaction::from_chain(
                ids.next_id(),
                chain,
            )?))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(time: i64) -> QueryObject {
        QueryObject::from_mapping([("time", time)])
    }

    #[test]
    fn duration_spans_first_to_last() {
        let chain = QueryCollection::from_objects([at(3), at(4), at(9)]);
        let tx = Transaction::from_chain(7, chain).unwrap();
        assert_eq!(tx.id(), 7);
        assert_eq!(tx.duration(), 6);
        assert_eq!(tx.record().int("start").unwrap(), 3);
        assert_eq!(tx.record().int("end").unwrap(), 9);
    }

    #[test]
    fn chain_without_time_is_rejected() {
        let chain = QueryCollection::from_objects([at(3), QueryObject::from_mapping([("x", 1)])]);
        assert!(Transaction::from_chain(0, chain).is_err());
        assert!(Transaction::from_chain(0, QueryCollection::default()).is_err());
    }

    #[test]
    fn ids_increase_across_chains() {
        let chains: QueryCollection = vec![
            Element::Chain(QueryCollection::from_objects([at(0), at(1)])),
            Element::Chain(QueryCollection::from_objects([at(5), at(8)])),
        ]
        .into_iter()
        .collect();
        let mut ids = TransactionIds::starting_at(10);
        let txs = chains.transactions(&mut ids).unwrap();
        assert_eq!(txs.get(1).unwrap().int("id").unwrap(), 11);
        assert_eq!(txs.get(1).unwrap().int("duration").unwrap(), 3);
        assert_eq!(ids.next_id(), 12);
    }
}
