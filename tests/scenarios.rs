mod common;

use std::collections::HashSet;

use std::sync::atomic::AtomicBool;

use common::{ScriptedHost, admit, config, unchecked_config};
use pagesim::constants::{HIT_SERVICE_NS, IO_DELAY_NS, PAGE_SIZE};
use pagesim::memory::PageOwner;
use pagesim::report::Reporter;
use pagesim::simulation::drive;
use pagesim::{RequestDispatcher, SimError, SimEvent};

#[test]
fn test_no_eviction_pressure_faults_once_per_page() {
    let mut d = RequestDispatcher::new(&config(256, 1, 1));
    let mut host = ScriptedHost::default();
    let pid = admit(&mut d, &mut host, 1)[0];

    let pages = [0u32, 3, 3, 7, 0, 31, 7, 3, 12, 31, 0];
    for (i, &page) in pages.iter().enumerate() {
        host.push(pid, page * PAGE_SIZE + (i as u32 * 37) % PAGE_SIZE, i % 3 == 0);
    }
    assert_eq!(d.receive_requests(&mut host).unwrap(), pages.len());

    let distinct: HashSet<u32> = pages.iter().copied().collect();
    let stats = d.stats();
    assert_eq!(stats.total_accesses, pages.len() as u64);
    assert_eq!(stats.total_page_faults, distinct.len() as u64);
    assert_eq!(host.replies.len(), pages.len());
    assert!(d.io_queue().is_empty());
    assert!(d.check_invariants().is_ok());
}

#[test]
fn test_dirty_lru_victim_charges_one_write_back() {
    let mut d = RequestDispatcher::new(&config(2, 1, 1));
    let mut host = ScriptedHost::default();
    let pid = admit(&mut d, &mut host, 1)[0];

    host.push(pid, 0, true); // P0, dirty
    d.receive_requests(&mut host).unwrap();
    d.advance_clock(1_000);
    host.push(pid, PAGE_SIZE, false); // P1
    d.receive_requests(&mut host).unwrap();
    d.advance_clock(1_000);
    host.push(pid, 2 * PAGE_SIZE, false); // P2, no free frame
    d.receive_requests(&mut host).unwrap();

    assert_eq!(host.replies.len(), 2);
    assert_eq!(d.io_queue().len(), 1);
    let due = d.io_queue().iter().next().unwrap().due_at;
    d.take_events();

    d.advance_clock(IO_DELAY_NS);
    assert_eq!(d.clock(), due);
    assert_eq!(d.drain_io(&mut host).unwrap(), 1);

    // exactly one write-back charge before the reply
    assert_eq!(d.clock(), due.plus_ns(IO_DELAY_NS));
    let events = d.take_events();
    let write_backs = events
        .iter()
        .filter(|e| matches!(e, SimEvent::WriteBack { .. }))
        .count();
    assert_eq!(write_backs, 1);
    assert!(events.iter().any(|e| matches!(
        e,
        SimEvent::Evicted { frame: 0, owner: PageOwner { slot: 0, page: 0 }, dirty: true, .. }
    )));

    let slot = d.directory().find(pid).unwrap();
    assert_eq!(d.memory().translate(d.directory(), slot, 0), None);
    assert_eq!(d.memory().translate(d.directory(), slot, 1), Some(1));
    assert_eq!(d.memory().translate(d.directory(), slot, 2), Some(0));
    assert!(!d.memory().frame(0).unwrap().dirty);
    assert_eq!(host.replies.len(), 3);
    assert!(d.check_invariants().is_ok());
}

#[test]
fn test_concurrency_limit_defers_third_admission() {
    let mut cfg = config(8, 3, 2);
    cfg.tick_ns = (2_000_000, 2_000_000);
    let mut d = RequestDispatcher::new(&cfg);
    let mut host = ScriptedHost::default();

    for _ in 0..20 {
        d.step(&mut host).unwrap();
        assert!(d.active_count() <= 2);
    }
    assert_eq!(d.launched(), 2);
    assert_eq!(host.spawned.len(), 2);

    host.exit(host.spawned[0]);
    d.step(&mut host).unwrap();
    assert_eq!(d.launched(), 3);
    assert_eq!(d.active_count(), 2);
    assert!(!d.is_finished());

    host.exit(host.spawned[1]);
    host.exit(host.spawned[2]);
    d.step(&mut host).unwrap();
    assert_eq!(d.active_count(), 0);
    assert!(d.is_finished());
}

#[test]
fn test_spawn_failure_defers_admission() {
    let mut d = RequestDispatcher::new(&config(8, 2, 2));
    let mut host = ScriptedHost { fail_spawn: true, ..ScriptedHost::default() };

    assert_eq!(d.admit_new(&mut host).unwrap(), None);
    assert_eq!(d.launched(), 0);

    host.fail_spawn = false;
    assert_eq!(d.admit_new(&mut host).unwrap(), Some(0));
    assert_eq!(d.launched(), 1);
}

#[test]
fn test_launch_interval_gates_admission() {
    let mut d = RequestDispatcher::new(&config(8, 5, 5));
    let mut host = ScriptedHost::default();

    assert!(d.admit_new(&mut host).unwrap().is_some());
    assert!(d.admit_new(&mut host).unwrap().is_none());
    d.advance_clock(999_999);
    assert!(d.admit_new(&mut host).unwrap().is_none());
    d.advance_clock(1);
    assert!(d.admit_new(&mut host).unwrap().is_some());
}

#[test]
fn test_fault_without_free_frame_is_withheld_until_due() {
    let mut d = RequestDispatcher::new(&config(2, 2, 2));
    let mut host = ScriptedHost::default();
    let pids = admit(&mut d, &mut host, 2);
    let (a, b) = (pids[0], pids[1]);

    host.push(a, 0, false);
    host.push(a, PAGE_SIZE, false);
    d.receive_requests(&mut host).unwrap();
    assert_eq!(d.memory().free_frames(), 0);

    let now = d.clock();
    host.push(b, 5, false);
    d.receive_requests(&mut host).unwrap();
    let pending = *d.io_queue().iter().next().unwrap();
    assert_eq!(pending.due_at, now.plus_ns(IO_DELAY_NS));
    assert_eq!(host.replies_for(b), 0);

    d.advance_clock(IO_DELAY_NS - 1);
    assert_eq!(d.drain_io(&mut host).unwrap(), 0);
    assert_eq!(host.replies_for(b), 0);

    d.advance_clock(1);
    let before = d.clock();
    assert_eq!(d.drain_io(&mut host).unwrap(), 1);
    assert_eq!(host.replies_for(b), 1);
    // clean victim: no extra charge
    assert_eq!(d.clock(), before);
    assert!(d.check_invariants().is_ok());
}

#[test]
fn test_exit_with_pending_fault_never_binds_stale_slot() {
    let mut d = RequestDispatcher::new(&config(2, 3, 2));
    let mut host = ScriptedHost::default();
    let pids = admit(&mut d, &mut host, 2);
    let (a, b) = (pids[0], pids[1]);
    let stale = d.directory().find(b).unwrap();

    host.push(a, 0, true);
    host.push(a, PAGE_SIZE, false);
    host.push(b, 3 * PAGE_SIZE, false);
    d.receive_requests(&mut host).unwrap();
    assert_eq!(d.io_queue().len(), 1);

    host.exit(b);
    d.reap_terminated(&mut host);
    assert!(d.io_queue().is_empty());
    assert!(d.check_invariants().is_ok());
    d.take_events();

    d.advance_clock(2 * IO_DELAY_NS);
    assert_eq!(d.drain_io(&mut host).unwrap(), 0);
    assert!(d
        .memory()
        .frames()
        .iter()
        .all(|f| f.owner.is_none_or(|owner| owner.slot != stale)));
    assert!(!d
        .take_events()
        .iter()
        .any(|e| matches!(e, SimEvent::Loaded { identity, .. } if *identity == b)));
    assert_eq!(host.replies_for(b), 0);

    // a late request from the departed worker is dropped
    host.push(b, 0, false);
    assert_eq!(d.receive_requests(&mut host).unwrap(), 0);
}

#[test]
fn test_pending_faults_complete_in_arrival_order() {
    let mut d = RequestDispatcher::new(&config(3, 3, 3));
    let mut host = ScriptedHost::default();
    let pids = admit(&mut d, &mut host, 3);
    let (a, b, c) = (pids[0], pids[1], pids[2]);

    for page in 0..3 {
        host.push(a, page * PAGE_SIZE, false);
    }
    d.receive_requests(&mut host).unwrap();
    host.push(b, 0, false);
    d.receive_requests(&mut host).unwrap();
    d.advance_clock(500);
    host.push(c, 0, true);
    d.receive_requests(&mut host).unwrap();
    assert_eq!(d.io_queue().len(), 2);
    host.replies.clear();

    d.advance_clock(IO_DELAY_NS);
    assert_eq!(d.drain_io(&mut host).unwrap(), 2);
    let order: Vec<_> = host.replies.iter().map(|r| r.sender).collect();
    assert_eq!(order, vec![b, c]);
    assert!(!d.directory().is_blocked(1));
    assert!(!d.directory().is_blocked(2));
    assert!(d.check_invariants().is_ok());
}

#[test]
fn test_hit_is_charged_service_time() {
    let mut d = RequestDispatcher::new(&config(4, 1, 1));
    let mut host = ScriptedHost::default();
    let pid = admit(&mut d, &mut host, 1)[0];

    host.push(pid, 10, false);
    d.receive_requests(&mut host).unwrap();
    let before = d.clock();
    host.push(pid, 20, false);
    host.push(pid, 30, true);
    d.receive_requests(&mut host).unwrap();
    assert_eq!(d.clock(), before.plus_ns(2 * HIT_SERVICE_NS));
    assert!(d.memory().frame(0).unwrap().dirty);
}

#[test]
fn test_step_emits_memory_map_each_simulated_second() {
    let mut cfg = config(4, 1, 1);
    cfg.tick_ns = (250_000_000, 250_000_000);
    let mut d = RequestDispatcher::new(&cfg);
    let mut host = ScriptedHost::default();

    for _ in 0..8 {
        d.step(&mut host).unwrap();
    }
    let dumps = d
        .take_events()
        .into_iter()
        .filter(|e| matches!(e, SimEvent::MemoryMap(_)))
        .count();
    assert_eq!(d.clock().seconds, 2);
    assert_eq!(dumps, 2);
}

#[test]
fn test_requests_sent_during_drain_wait_for_next_tick() {
    let mut d = RequestDispatcher::new(&config(2, 2, 2));
    let mut host = ScriptedHost::default();
    let pids = admit(&mut d, &mut host, 2);
    let (a, b) = (pids[0], pids[1]);

    host.push(a, 0, false);
    host.push(a, PAGE_SIZE, false);
    d.receive_requests(&mut host).unwrap();
    host.push(b, 3 * PAGE_SIZE, false);
    d.receive_requests(&mut host).unwrap();
    let due = d.io_queue().iter().next().unwrap().due_at;

    host.eager.push(a);
    host.push(a, 0, false);
    let before = d.clock();
    assert_eq!(d.receive_requests(&mut host).unwrap(), 1);
    assert_eq!(d.clock(), before.plus_ns(HIT_SERVICE_NS));
    assert_eq!(host.inbox.len(), 1);

    d.advance_clock(IO_DELAY_NS);
    assert!(d.clock() >= due);
    d.step(&mut host).unwrap();
    assert_eq!(host.replies_for(b), 1);
    assert!(d.check_invariants().is_ok());
}

#[test]
fn test_full_io_queue_is_fatal() {
    let mut d = RequestDispatcher::new(&unchecked_config(1, 3, 3));
    let mut host = ScriptedHost::default();
    let pids = admit(&mut d, &mut host, 3);

    host.push(pids[0], 0, false);
    host.push(pids[1], 0, false);
    host.push(pids[2], 0, false);
    let result = d.receive_requests(&mut host);
    assert!(matches!(result, Err(SimError::QueueSaturated { capacity: 1 })));
    assert!(result.unwrap_err().is_fatal());
    assert_eq!(d.io_queue().len(), 1);
}

#[test]
fn test_full_io_queue_stops_the_loop() {
    let cfg = unchecked_config(1, 3, 3);
    let mut d = RequestDispatcher::new(&cfg);
    let mut host = ScriptedHost::default();
    let pids = admit(&mut d, &mut host, 3);
    for &pid in &pids {
        host.push(pid, 0, false);
    }

    let mut reporter = Reporter::new(Vec::new(), false);
    let result = drive(&cfg, &mut d, &mut host, &mut reporter, &AtomicBool::new(false));
    assert!(matches!(result, Err(SimError::QueueSaturated { capacity: 1 })));
    assert_eq!(host.replies.len(), 1);
}
