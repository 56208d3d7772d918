pub mod aws;
pub mod ec2;

use std::collections::HashMap;

use planguard_types::ComponentKind;

/// Allocates deterministic component ids within one resource: the first
/// component of a kind gets `{address}:{kind}`, later ones `{address}:{kind}:{n}`.
pub(crate) struct IdAllocator<'a> {
    address: &'a str,
    counts: HashMap<ComponentKind, usize>,
}

impl<'a> IdAllocator<'a> {
    pub(crate) fn new(address: &'a str) -> Self {
        Self {
            address,
            counts: HashMap::new(),
        }
    }

    pub(crate) fn next(&mut self, kind: ComponentKind) -> String {
        let count = self.counts.entry(kind).or_insert(0);
        let id = if *count == 0 {
            planguard_types::BillingComponent::component_id(self.address, kind, None)
        } else {
            planguard_types::BillingComponent::component_id(self.address, kind, Some(*count))
        };
        *count += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_of_kind_has_no_index() {
        let mut ids = IdAllocator::new("aws_instance.web");
        assert_eq!(ids.next(ComponentKind::Compute), "aws_instance.web:compute");
        assert_eq!(ids.next(ComponentKind::Storage), "aws_instance.web:storage");
        assert_eq!(
            ids.next(ComponentKind::Storage),
            "aws_instance.web:storage:1"
        );
        assert_eq!(
            ids.next(ComponentKind::Compute),
            "aws_instance.web:compute:1"
        );
    }
}
