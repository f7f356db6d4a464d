use super::{LinkReference, LinkRelation};
use crate::model::PathName;

impl LinkReference {
    /// Resolve this link as seen from `source`.
    ///
    /// `exists` answers whether a page, placeholder or namespace is known
    /// under a name. A floating link is anchored on the first namespace,
    /// from the source's parent outward, that has a child named like its
    /// anchor. Without such a namespace the link points at the root-level
    /// name, which is a placeholder target rather than an error.
    pub fn resolve(&self, source: &PathName, exists: impl Fn(&PathName) -> bool) -> PathName {
        match self.relation {
            LinkRelation::Absolute => self.names.clone(),
            LinkRelation::Relative => source.child(&self.names),
            LinkRelation::Floating => {
                let anchor = PathName::from_parts(vec![self.anchor().to_string()]);
                source
                    .ancestors()
                    .find(|namespace| exists(&namespace.child(&anchor)))
                    .map(|namespace| namespace.child(&self.names))
                    .unwrap_or_else(|| self.names.clone())
            }
        }
    }
}
