use super::list::TypeVisitor;
use super::{Component, ComponentId, ComponentList, Mask, Signature};
use crate::util::DbgTypeId;

struct Collect(Vec<DbgTypeId>);

impl TypeVisitor for Collect {
    fn visit<T: Component>(&mut self) { self.0.push(DbgTypeId::of::<T>()); }
}

fn collect<L: ComponentList>() -> Vec<DbgTypeId> {
    let mut collect = Collect(Vec::new());
    L::visit(&mut collect);
    collect.0
}

#[test]
fn test_list_visits_in_order() {
    assert_eq!(<() as ComponentList>::LEN, 0);
    assert!(collect::<()>().is_empty());

    assert_eq!(<(u8, u16, u32) as ComponentList>::LEN, 3);
    assert_eq!(
        collect::<(u8, u16, u32)>(),
        vec![DbgTypeId::of::<u8>(), DbgTypeId::of::<u16>(), DbgTypeId::of::<u32>()]
    );

    assert_eq!(<(u8, u8, u8, u8, u8, u8, u8, u8) as ComponentList>::LEN, 8);
}

#[test]
fn test_mask_ops() {
    let a = Mask::new().with(ComponentId::new(0)).with(ComponentId::new(70));
    let b = Mask::new().with(ComponentId::new(70));
    let c = Mask::new().with(ComponentId::new(127));

    assert!(a.is_superset_of(&b));
    assert!(!b.is_superset_of(&a));
    assert!(a.is_superset_of(&Mask::new()));
    assert!(a.intersects(&b));
    assert!(!a.intersects(&c));
    assert_eq!(a.len(), 2);
    assert_eq!(
        a.union(&c).iter_ids().collect::<Vec<_>>(),
        vec![ComponentId::new(0), ComponentId::new(70), ComponentId::new(127)]
    );

    let mut d = a;
    d.unset(ComponentId::new(0));
    assert_eq!(d, b);
    assert!(Mask::new().is_empty());
}

#[test]
#[should_panic = "component index 128 exceeds the limit of 128 types"]
fn test_component_id_limit() { ComponentId::new(128); }

#[test]
fn test_signature_matches() {
    let signature = Signature {
        require:  Mask::new().with(ComponentId::new(1)),
        optional: Mask::new().with(ComponentId::new(2)),
        exclude:  Mask::new().with(ComponentId::new(3)),
    };

    assert!(signature.matches(&Mask::new().with(ComponentId::new(1))));
    assert!(signature.matches(&Mask::new().with(ComponentId::new(1)).with(ComponentId::new(2))));
    assert!(!signature.matches(&Mask::new().with(ComponentId::new(2))));
    assert!(!signature.matches(&Mask::new().with(ComponentId::new(1)).with(ComponentId::new(3))));

    assert!(signature.is_affected_by(
        &Mask::new(),
        &Mask::new().with(ComponentId::new(1)),
    ));
    assert!(!signature.is_affected_by(
        &Mask::new().with(ComponentId::new(1)),
        &Mask::new().with(ComponentId::new(1)).with(ComponentId::new(2)),
    ));
}

#[test]
fn test_types_assigns_dense_ids() {
    let mut types = super::Types::default();
    let a = types.get_or_insert(DbgTypeId::of::<u8>());
    let b = types.get_or_insert(DbgTypeId::of::<String>());
    assert_eq!(a, ComponentId::new(0));
    assert_eq!(b, ComponentId::new(1));
    assert_eq!(types.get_or_insert(DbgTypeId::of::<u8>()), a);
    assert_eq!(types.get(std::any::TypeId::of::<String>()), Some(b));
    assert_eq!(types.type_of(b), Some(DbgTypeId::of::<String>()));
    assert_eq!(types.len(), 2);
}
