// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn publish_reaches_every_subscriber() {
    let bus = ConnectivityBus::new();
    let mut first = bus.subscribe();
    let mut second = bus.subscribe();

    bus.publish(ConnectionEvent::Connected);

    assert_eq!(first.try_recv().unwrap(), ConnectionEvent::Connected);
    assert_eq!(second.try_recv().unwrap(), ConnectionEvent::Connected);
}

#[tokio::test]
async fn late_subscriber_misses_earlier_events() {
    let bus = ConnectivityBus::new();
    bus.publish(ConnectionEvent::Connected);

    let mut rx = bus.subscribe();
    assert!(rx.try_recv().is_err());

    bus.publish(ConnectionEvent::Disconnected);
    assert_eq!(rx.try_recv().unwrap(), ConnectionEvent::Disconnected);
}

#[test]
fn dropped_receivers_are_pruned() {
    let bus = ConnectivityBus::new();
    let rx = bus.subscribe();
    let _kept = bus.subscribe();
    assert_eq!(bus.subscriber_count(), 2);

    drop(rx);
    bus.publish(ConnectionEvent::Connected);
    assert_eq!(bus.subscriber_count(), 1);
}

#[test]
fn clones_share_subscribers() {
    let bus = ConnectivityBus::new();
    let mut rx = bus.subscribe();

    bus.clone().publish(ConnectionEvent::Disconnected);
    assert_eq!(rx.try_recv().unwrap(), ConnectionEvent::Disconnected);
}
