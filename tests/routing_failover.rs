//! Spec §8 scenario 5: from A's point of view, B and C are both direct
//! neighbors, D is reachable only indirectly through B. Losing the direct
//! route to B must not disturb C's route and must make D unreachable,
//! without resurrecting a stale path through the dead hop.

use vesper_rt::net::{ConnectionId, Route, RoutingTable};
use vesper_rt::prelude::NodeId;

fn node(tag: u8) -> NodeId {
    NodeId::new(vec![tag; 16], tag as u32)
}

#[test]
fn losing_a_direct_hop_only_invalidates_routes_that_depended_on_it() {
    let table = RoutingTable::new();

    let b = node(2);
    let c = node(3);
    let d = node(4);

    let conn_b = ConnectionId::next();
    let conn_c = ConnectionId::next();
    table.insert_direct(b.clone(), conn_b);
    table.insert_direct(c.clone(), conn_c);
    assert!(table.insert_indirect(d.clone(), b.clone()));

    assert_eq!(table.resolve(&b), Route::Direct(conn_b));
    assert_eq!(table.resolve(&c), Route::Direct(conn_c));
    assert_eq!(table.resolve(&d), Route::Indirect(conn_b));

    assert!(table.remove_direct(&b));

    assert_eq!(table.resolve(&c), Route::Direct(conn_c), "C's direct route must survive B's failure");
    assert_eq!(table.resolve(&d), Route::Unreachable, "D had no other hop and must become unreachable");
    assert_eq!(table.resolve(&b), Route::Unreachable, "B itself is gone");
}
