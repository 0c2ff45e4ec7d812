use super::model::AssociationDescriptor;
use crate::core::Result;
use indexmap::IndexMap;
use indexmap::map::Entry;

/// Unordered pair of entity type names, stored sorted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TypePair(String, String);

impl TypePair {
    fn new(first: &str, second: &str) -> Self {
        if first <= second {
            Self(first.to_string(), second.to_string())
        } else {
            Self(second.to_string(), first.to_string())
        }
    }
}

/// Working state of one normalization run: at most one association per
/// unordered pair of types, in first-seen order.
#[derive(Debug, Default)]
pub(crate) struct AssociationAccumulator {
    by_pair: IndexMap<TypePair, AssociationDescriptor>,
}

impl AssociationAccumulator {
    /// Existing association between the two types, or the one `build` creates.
    pub(crate) fn get_or_insert_with<F>(
        &mut self,
        first: &str,
        second: &str,
        build: F,
    ) -> Result<&AssociationDescriptor>
    where
        F: FnOnce() -> Result<AssociationDescriptor>,
    {
        let association: &AssociationDescriptor = match self.by_pair.entry(TypePair::new(first, second)) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(build()?),
        };
        Ok(association)
    }

    pub(crate) fn len(&self) -> usize {
        self.by_pair.len()
    }

    pub(crate) fn into_associations(self) -> Vec<AssociationDescriptor> {
        self.by_pair.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::key_shape::PropertyRef;
    use crate::metadata::model::{AssociationEnd, ConstraintRole, Multiplicity, ReferentialConstraint};

    fn association(name: &str) -> AssociationDescriptor {
        let end = |multiplicity, role: &str| AssociationEnd {
            entity_set: None,
            multiplicity,
            role: role.to_string(),
            type_name: String::new(),
        };
        let role = |role: &str| ConstraintRole {
            property_ref: vec![PropertyRef::new("Id")],
            role: role.to_string(),
        };
        AssociationDescriptor {
            association: name.to_string(),
            name: name.to_string(),
            end: [end(Multiplicity::Many, "s"), end(Multiplicity::One, "t")],
            referential_constraint: ReferentialConstraint {
                dependent: role("s"),
                principal: role("t"),
            },
        }
    }

    #[test]
    fn either_ordering_of_the_pair_reuses_the_first_association() {
        let mut accumulator = AssociationAccumulator::default();
        accumulator
            .get_or_insert_with("Order", "Customer", || Ok(association("Order_Customer")))
            .unwrap();
        let reused = accumulator
            .get_or_insert_with("Customer", "Order", || Ok(association("Customer_Order")))
            .unwrap();
        assert_eq!(reused.name, "Order_Customer");
        assert_eq!(accumulator.len(), 1);
    }

    #[test]
    fn distinct_pairs_keep_insertion_order() {
        let mut accumulator = AssociationAccumulator::default();
        for (a, b) in [("Order", "Customer"), ("OrderLine", "Order"), ("Customer", "Order")] {
            let name = format!("{}_{}", a, b);
            accumulator.get_or_insert_with(a, b, || Ok(association(&name))).unwrap();
        }
        let names: Vec<_> = accumulator
            .into_associations()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, vec!["Order_Customer", "OrderLine_Order"]);
    }
}
