//! Path binder: resolve a keyed object into a typed source record.

use tracing::debug;

use crate::collection::{Element, QueryCollection};
use crate::error::{OozeError, Result};
use crate::object::{QueryObject, TypeTag};
use crate::registry::Ooze;

impl Ooze {
    /// The unique record of type `tag` whose identity key equals `target`'s.
    pub fn bind(&self, target: &QueryObject, tag: &TypeTag) -> Result<QueryObject> {
        let Some(key) = target.key() else {
            return Err(OozeError::Bind {
                key: target.to_string(),
                tag: tag.to_string(),
                matches: 0,
            });
        };

        let mut found = Vec::new();
        for index in self.registry().producers(tag) {
            found.extend(self.registry().sources()[index].lookup(tag, key)?);
        }
        debug!(key, tag = %tag, matches = found.len(), "bind");

        if found.len() == 1 {
            Ok(found.remove(0))
        } else {
            Err(OozeError::Bind {
                key: key.to_string(),
                tag: tag.to_string(),
                matches: found.len(),
            })
        }
    }

    pub fn bind_all(&self, targets: &QueryCollection, tag: &TypeTag) -> Result<QueryCollection> {
        targets.map(|element| Ok(Element::Object(self.bind(element.object()?, tag)?)))
    }
}
