//! Replication as observed through a client-side mirror
//!
//! After every tick the mirror must agree with the server on every field the
//! recipient is allowed to read, and quiet ticks must produce no traffic.

use super::support::TestWorld;
use crate::object::layout::*;
use crate::replication::block::{visible_dynamic_mask, visible_value_mask};
use crate::replication::{build_values_update_block, recipient_flags, ObjectMirror, UpdateBlock, UpdateData};
use crate::types::Guid;

fn assert_mirror_matches(world: &TestWorld, mirror: &ObjectMirror, recipient: Guid, target: Guid) {
    let observer = world.map.get_object(recipient).expect("recipient resident");
    let object = world.map.get_object(target).expect("target resident");
    let mirrored = mirror.get(target).expect("mirror knows target");
    let flags = recipient_flags(object, observer);

    for index in visible_value_mask(object.kind(), flags).iter() {
        assert_eq!(
            mirrored.value(index),
            object.values().raw()[index],
            "field {index} of {target} diverged for {recipient}"
        );
    }
    for index in visible_dynamic_mask(object.kind(), flags).iter() {
        assert_eq!(mirrored.dynamic[index].as_slice(), object.dynamic().get(index), "dynamic {index} diverged");
    }
}

#[test]
fn mirror_tracks_server_state_across_ticks() {
    let mut world = TestWorld::new();
    let player = world.add_player("Ana", 100.0, 100.0);
    let creature = world.add_creature(120.0, 100.0);
    let mut mirror = ObjectMirror::new();

    world.tick();
    world.sync(&mut mirror, player);
    assert!(mirror.contains(player));
    assert!(mirror.contains(creature));
    assert_mirror_matches(&world, &mirror, player, creature);
    assert_mirror_matches(&world, &mirror, player, player);

    world
        .map
        .with_object_mut(creature, |object| {
            object.values_mut().set_u32(UNIT_FIELD_HEALTH, 42);
            object.values_mut().set_flag(UNIT_FIELD_FLAGS, UNIT_FLAG_IN_COMBAT);
            object.dynamic_mut().push(UNIT_DYNAMIC_FIELD_PASSIVE_SPELLS, 1337);
        })
        .expect("resident");
    world.tick();
    world.sync(&mut mirror, player);
    assert_eq!(mirror.get(creature).expect("known").value(UNIT_FIELD_HEALTH), 42);
    assert_mirror_matches(&world, &mirror, player, creature);

    world
        .map
        .with_object_mut(player, |object| object.values_mut().set_u32(PLAYER_XP, 900))
        .expect("resident");
    world.tick();
    world.sync(&mut mirror, player);
    assert_mirror_matches(&world, &mirror, player, player);
    assert_eq!(mirror.get(player).expect("self known").value(PLAYER_XP), 900);
}

#[test]
fn quiet_ticks_send_nothing() {
    let mut world = TestWorld::new();
    let player = world.add_player("Ana", 100.0, 100.0);
    let creature = world.add_creature(110.0, 100.0);
    world.tick();
    world.sink.clear();

    world.ticks(3);
    assert_eq!(world.sink.packet_count(player), 0);

    let changed = world
        .map
        .with_object_mut(creature, |object| object.values_mut().update_u32(UNIT_FIELD_LEVEL, 1))
        .expect("resident");
    assert!(!changed);
    world.tick();
    assert_eq!(world.sink.packet_count(player), 0);
}

#[test]
fn forced_set_is_sent_once() {
    let mut world = TestWorld::new();
    let player = world.add_player("Ana", 100.0, 100.0);
    let creature = world.add_creature(110.0, 100.0);
    world.tick();
    world.sink.clear();

    let level = world.map.get_object(creature).expect("resident").values().get_u32(UNIT_FIELD_LEVEL);
    world
        .map
        .with_object_mut(creature, |object| object.values_mut().set_u32(UNIT_FIELD_LEVEL, level))
        .expect("resident");
    world.tick();
    let blocks = world.sink.blocks(player);
    assert_eq!(blocks.len(), 1);
    let UpdateBlock::Values { guid, fields } = &blocks[0] else {
        panic!("expected a values block, got {:?}", blocks[0]);
    };
    assert_eq!(*guid, creature);
    assert_eq!(fields.values, vec![(UNIT_FIELD_LEVEL, level)]);

    world.sink.clear();
    world.tick();
    assert_eq!(world.sink.packet_count(player), 0);
    assert!(!world.map.get_object(creature).expect("resident").has_changes());
}

#[test]
fn private_fields_reach_only_their_owner() {
    let mut world = TestWorld::new();
    let ana = world.add_player("Ana", 100.0, 100.0);
    let bo = world.add_player("Bo", 110.0, 100.0);
    let mut ana_view = ObjectMirror::new();
    let mut bo_view = ObjectMirror::new();
    world.tick();

    world
        .map
        .with_object_mut(ana, |object| {
            object.values_mut().set_u32(PLAYER_FIELD_COINAGE, 5000);
            object.values_mut().set_u32(UNIT_FIELD_HEALTH, 77);
        })
        .expect("resident");
    world.tick();
    world.sync(&mut ana_view, ana);
    world.sync(&mut bo_view, bo);

    assert_eq!(ana_view.get(ana).expect("self").value(PLAYER_FIELD_COINAGE), 5000);
    assert_eq!(bo_view.get(ana).expect("peer").value(PLAYER_FIELD_COINAGE), 0);
    assert_eq!(bo_view.get(ana).expect("peer").value(UNIT_FIELD_HEALTH), 77);
    assert_mirror_matches(&world, &bo_view, bo, ana);
}

#[test]
fn values_block_layout_on_the_wire() {
    let mut world = TestWorld::new();
    let player = world.add_player("Ana", 100.0, 100.0);
    let creature = world.add_creature(110.0, 100.0);
    world.tick();

    world
        .map
        .with_object_mut(creature, |object| {
            object.values_mut().set_u32(OBJECT_FIELD_DYNAMIC_FLAGS, 10);
            object.dynamic_mut().set(UNIT_DYNAMIC_FIELD_CHANNEL_OBJECTS, &[7, 8]);
        })
        .expect("resident");

    let mut data = UpdateData::new(0);
    let target = world.map.get_object(creature).expect("resident");
    let recipient = world.map.get_object(player).expect("resident");
    assert!(build_values_update_block(target, recipient, &mut data));
    let packet = data.build_packet();

    let mut expected = Vec::new();
    expected.extend_from_slice(&0u32.to_le_bytes());
    expected.extend_from_slice(&1u32.to_le_bytes());
    expected.push(0);
    expected.extend_from_slice(&creature.raw().to_le_bytes());
    for word in [1u32, 1 << 5, 10, 1, 2, 2, 7, 8] {
        expected.extend_from_slice(&word.to_le_bytes());
    }
    assert_eq!(packet, expected);
}

#[test]
fn dynamic_arrays_replicate_whole() {
    let mut world = TestWorld::new();
    let player = world.add_player("Ana", 100.0, 100.0);
    let creature = world.add_creature(110.0, 100.0);
    let mut mirror = ObjectMirror::new();
    world.tick();
    world.sync(&mut mirror, player);

    world
        .map
        .with_object_mut(creature, |object| {
            object.dynamic_mut().set(UNIT_DYNAMIC_FIELD_WORLD_EFFECTS, &[1, 2, 3]);
        })
        .expect("resident");
    world.tick();
    world
        .map
        .with_object_mut(creature, |object| {
            assert!(object.dynamic_mut().remove_value(UNIT_DYNAMIC_FIELD_WORLD_EFFECTS, 2));
        })
        .expect("resident");
    world.tick();
    world.sync(&mut mirror, player);

    assert_eq!(mirror.get(creature).expect("known").dynamic[UNIT_DYNAMIC_FIELD_WORLD_EFFECTS], vec![1, 3]);
}
