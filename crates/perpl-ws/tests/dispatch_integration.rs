//! Integration tests for the frame dispatch table.
//!
//! Exercises the full path raw frame -> decode -> consumer event over the
//! documented message shapes.

use perpl_ws::events::event_for;
use perpl_ws::message::decode_frame;
use perpl_ws::{BookLevel, Inbound, WsEvent};

/// Every documented `mt` dispatches to exactly one event (or is
/// connection-internal), and unknown discriminants are dropped silently.
#[test]
fn test_full_dispatch_table() {
    // (frame, expected stream name; None for connection-internal frames)
    let cases: Vec<(&str, Option<&str>)> = vec![
        (r#"{"mt":2}"#, None),
        (
            r#"{"mt":6,"subs":[{"stream":"order-book@16","sid":3}]}"#,
            None,
        ),
        (
            r#"{"mt":9,"d":[{"pid":16,"mark":950000,"oracle":949900,"fr":125,"oil":1,"ois":2,"ts":1700000000}]}"#,
            Some("market-state"),
        ),
        (
            r#"{"mt":15,"pid":16,"b":[[49000,10000]],"a":[[51000,8000]]}"#,
            Some("order-book"),
        ),
        (r#"{"mt":16,"pid":16,"b":[[48000,0]]}"#, Some("order-book")),
        (
            r#"{"mt":17,"pid":16,"d":[{"p":950000,"l":50,"bt":true,"at":1700000000000}]}"#,
            Some("trades"),
        ),
        (
            r#"{"mt":18,"pid":16,"d":[{"p":950100,"l":25,"bt":false,"at":1700000001000}]}"#,
            Some("trades"),
        ),
        (
            r#"{"mt":19,"accts":[{"id":100,"owner":"0x01","b":1000000,"lk":250000}]}"#,
            Some("wallet"),
        ),
        (
            r#"{"mt":23,"d":[{"oid":7,"pid":16,"aid":100,"t":1,"p":950000,"l":100,"lv":1000,"fl":0,"st":1}]}"#,
            Some("orders"),
        ),
        (
            r#"{"mt":24,"d":[{"oid":7,"pid":16,"aid":100,"t":1,"p":950000,"l":0,"lv":1000,"fl":0,"st":3,"r":true}]}"#,
            Some("orders"),
        ),
        (
            r#"{"mt":25,"d":[{"oid":7,"pid":16,"aid":100,"mk":false,"p":950000,"l":100,"fee":475,"blk":50001,"lg":2}]}"#,
            Some("fills"),
        ),
        (
            r#"{"mt":26,"d":[{"id":5,"pid":16,"aid":100,"pt":1,"ep":950000,"l":100,"dep":1000000,"pnl":0,"st":1}]}"#,
            Some("positions"),
        ),
        (
            r#"{"mt":27,"d":[{"id":5,"pid":16,"aid":100,"pt":1,"ep":950000,"l":100,"dep":1000000,"pnl":-250,"st":1}]}"#,
            Some("positions"),
        ),
        (r#"{"mt":100,"blk":50002}"#, Some("heartbeat")),
    ];

    for (frame, expected_stream) in cases {
        let decoded = decode_frame(frame)
            .unwrap_or_else(|e| panic!("decode failed for {frame}: {e}"))
            .unwrap_or_else(|| panic!("frame dropped: {frame}"));
        let event = event_for(decoded);
        match expected_stream {
            Some(stream) => {
                assert_eq!(
                    event.as_ref().map(|e| e.stream()),
                    Some(stream),
                    "wrong stream for {frame}"
                );
            }
            None => assert_eq!(event, None, "internal frame emitted an event: {frame}"),
        }
    }

    // Unknown mt is dropped, not an error.
    assert_eq!(decode_frame(r#"{"mt":777,"x":1}"#).unwrap(), None);
}

#[test]
fn test_snapshot_and_update_are_distinguished() {
    let snapshot = decode_frame(r#"{"mt":26,"d":[]}"#).unwrap().unwrap();
    assert!(matches!(snapshot, Inbound::PositionsSnapshot(_)));
    match event_for(snapshot).unwrap() {
        WsEvent::Positions { snapshot, .. } => assert!(snapshot),
        other => panic!("unexpected event {other:?}"),
    }

    let update = decode_frame(r#"{"mt":27,"d":[]}"#).unwrap().unwrap();
    match event_for(update).unwrap() {
        WsEvent::Positions { snapshot, .. } => assert!(!snapshot),
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn test_book_levels_carry_offset_and_volume() {
    let decoded = decode_frame(r#"{"mt":15,"pid":16,"b":[[49000,10000],[48000,5000]],"a":[[51000,8000]]}"#)
        .unwrap()
        .unwrap();
    let Inbound::BookSnapshot(book) = decoded else {
        panic!("expected book snapshot");
    };
    assert_eq!(book.pid, 16);
    assert_eq!(book.b, vec![BookLevel(49000, 10000), BookLevel(48000, 5000)]);
    assert_eq!(book.a, vec![BookLevel(51000, 8000)]);
}
