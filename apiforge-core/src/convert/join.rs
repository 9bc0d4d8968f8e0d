use crate::graph::{DeletePolicy, Entity, EntityOrigin, Field, FieldType};
use crate::naming;

/// Build the join entity mediating `left` <-> `right`.
///
/// `left` and `right` must already be in join-name order so that either side
/// declaring the relationship yields the same entity.
pub(super) fn build_join_entity(name: &str, left: &Entity, right: &Entity) -> Entity {
    let left_column = naming::foreign_key_field(&left.name);
    let right_column = if left.name == right.name {
        format!("related_{}", naming::foreign_key_field(&right.name))
    } else {
        naming::foreign_key_field(&right.name)
    };

    let mut entity = Entity::new(name);
    entity.description = format!("Join entity for {} and {}", left.name, right.name);
    entity.add_field(key_column(&left_column, left));
    entity.add_field(key_column(&right_column, right));
    entity.composite_primary_key = Some(vec![left_column, right_column]);
    entity.origin = EntityOrigin::SynthesizedJoin {
        left: left.name.clone(),
        right: right.name.clone(),
    };
    entity
}

/// A required column referencing the participant's key; `id` when it has none.
fn key_column(column: &str, participant: &Entity) -> Field {
    let (key_name, key_type) = participant
        .single_primary_key()
        .map_or(("id", FieldType::Uuid), |pk| (pk.name.as_str(), pk.field_type));

    let mut field = Field::new(column, key_type)
        .required()
        .references(&participant.name, key_name);
    if let Some(fk) = field.foreign_key.as_mut() {
        fk.on_delete = DeletePolicy::Cascade;
    }
    field.explicit.unique = true;
    field.explicit.description = true;
    field.explicit.sensitive = true;
    field
}
