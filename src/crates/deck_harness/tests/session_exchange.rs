#[path = "deck_support.rs"]
mod support;

use std::time::Duration;

use deck_harness::{
    Clock, Command, HarnessError, ManualClock, ScriptedLink, Session, SessionConfig,
};
use support::open_session;

#[test]
fn boot_chatter_is_drained_before_first_command() {
    let clock = ManualClock::new();
    let link = ScriptedLink::new(clock.clone())
        .with_boot_line("CTRL:READY")
        .with_boot_line("BOOT:PIO loaded")
        .with_boot_line("STATUS:CH=0 STATE=IDLE")
        .on("STATUS:0", [support::MOVING]);

    let mut session = open_session(link, &clock).expect("session should open");
    let reply = session
        .send(Command::Status(0))
        .expect("exchange should succeed");

    let texts: Vec<&str> = reply.iter().map(|line| line.as_str()).collect();
    assert_eq!(texts, vec![support::MOVING]);
}

#[test]
fn silent_link_opens_without_error_within_grace() {
    let clock = ManualClock::new();
    let link = ScriptedLink::new(clock.clone());

    let session = open_session(link, &clock).expect("silent boot is valid");
    let config = SessionConfig::default();
    assert!(session.is_open());
    assert!(clock.now() <= config.settle_delay + config.boot_grace);
}

#[test]
fn endless_boot_chatter_stops_at_grace_window() {
    let clock = ManualClock::new();
    let mut link = ScriptedLink::new(clock.clone());
    for index in 0..5000 {
        link = link.with_boot_line(format!("BOOT:diag {index}"));
    }

    let session = open_session(link, &clock).expect("session should open");
    let config = session.config().clone();
    assert_eq!(clock.now(), config.settle_delay + config.boot_grace);
}

#[test]
fn boot_grace_is_configurable() {
    let clock = ManualClock::new();
    let mut link = ScriptedLink::new(clock.clone());
    for index in 0..1000 {
        link = link.with_boot_line(format!("BOOT:diag {index}"));
    }
    let config = SessionConfig::default().with_boot_grace(Duration::from_millis(250));

    let _session =
        Session::connect_with_clock(link, clock.clone(), config).expect("session should open");
    assert_eq!(clock.now(), Duration::from_millis(350));
}

#[test]
fn open_failure_surfaces_connection_error_and_never_closes() {
    let clock = ManualClock::new();
    let link = ScriptedLink::new(clock.clone()).failing_open("no such device");
    let handle = link.handle();

    match open_session(link, &clock) {
        Err(HarnessError::Connection { reason, .. }) => assert_eq!(reason, "no such device"),
        Err(other) => panic!("expected connection error, got {other}"),
        Ok(_) => panic!("open should fail"),
    }
    assert_eq!(handle.close_calls(), 0);
}

#[test]
fn open_is_idempotent() {
    let clock = ManualClock::new();
    let link = ScriptedLink::new(clock.clone());
    let handle = link.handle();

    let mut session = open_session(link, &clock).expect("session should open");
    session.open().expect("second open is a no-op");
    assert_eq!(handle.open_calls(), 1);
}

#[test]
fn commands_on_closed_session_are_rejected() {
    let clock = ManualClock::new();
    let link = ScriptedLink::new(clock.clone());
    let mut session = Session::with_clock(link, clock, SessionConfig::default());

    assert!(matches!(
        session.send(Command::Home(0)),
        Err(HarnessError::NotOpen)
    ));

    session.open().expect("session should open");
    session.close();
    assert!(matches!(
        session.send_command("HOME:0", false),
        Err(HarnessError::NotOpen)
    ));
}

#[test]
fn is_open_tracks_link_state_across_close() {
    let clock = ManualClock::new();
    let link = ScriptedLink::new(clock.clone());
    let handle = link.handle();
    let mut session = Session::with_clock(link, clock, SessionConfig::default());
    assert!(!session.is_open());

    session.open().expect("session should open");
    assert!(session.is_open());
    assert!(handle.is_open());

    session.close();
    assert!(!session.is_open());
    assert!(!handle.is_open());
}

#[test]
fn command_is_trimmed_and_written_as_one_line() {
    let clock = ManualClock::new();
    let link = ScriptedLink::new(clock.clone()).on("HOME:0", ["CTRL:OK"]);
    let handle = link.handle();

    let mut session = open_session(link, &clock).expect("session should open");
    let reply = session
        .send_command("  HOME:0 \n", false)
        .expect("exchange should succeed");

    assert_eq!(handle.written(), vec!["HOME:0".to_string()]);
    assert_eq!(reply.len(), 1);
    assert!(reply[0].is_ctrl());
}

#[test]
fn multi_line_burst_is_collected_in_device_order() {
    let clock = ManualClock::new();
    let burst = [
        "CTRL:OK",
        "MOVE:CH=0 POS=0 TARGET=1200 STATE=MOVING",
        "MOVE:SPEED=4000 ACC=16000 PLAN_US=412000 STEPS=1200",
    ];
    let link = ScriptedLink::new(clock.clone()).on("MOVE:0,1200", burst);

    let mut session = open_session(link, &clock).expect("session should open");
    let reply = session
        .send(Command::Move {
            channel: 0,
            steps: 1200,
        })
        .expect("exchange should succeed");

    let texts: Vec<&str> = reply.iter().map(|line| line.as_str()).collect();
    assert_eq!(texts, burst.to_vec());
}

#[test]
fn silent_device_yields_empty_reply_after_full_timeout() {
    let clock = ManualClock::new();
    let link = ScriptedLink::new(clock.clone());

    let mut session = open_session(link, &clock).expect("session should open");
    let before = clock.now();
    let reply = session
        .send(Command::Status(0))
        .expect("silence is not an error");

    assert!(reply.is_empty());
    assert_eq!(clock.now() - before, session.config().timeout);
}

#[test]
fn split_and_noisy_bytes_are_reassembled() {
    let clock = ManualClock::new();
    let link = ScriptedLink::new(clock.clone()).on_raw(
        "STATUS:0",
        vec![
            b"STATUS:STA".to_vec(),
            b"TE=ID\xffLE ERR=OK\r\n\r\nCT".to_vec(),
            b"RL:OK\r\n".to_vec(),
        ],
    );

    let mut session = open_session(link, &clock).expect("session should open");
    let reply = session
        .send_quiet(Command::Status(0))
        .expect("exchange should succeed");

    let texts: Vec<&str> = reply.iter().map(|line| line.as_str()).collect();
    assert_eq!(texts, vec!["STATUS:STATE=IDLE ERR=OK", "CTRL:OK"]);
}

#[test]
fn leading_ctrl_line_ends_collection_near_deadline() {
    let clock = ManualClock::new();
    let mut burst = vec!["CTRL:OK".to_string()];
    burst.extend((1..2000).map(|index| format!("TRACE:{index}")));
    let link = ScriptedLink::new(clock.clone()).on("HOME:0", burst);

    let mut session = open_session(link, &clock).expect("session should open");
    let reply = session
        .send_quiet(Command::Home(0))
        .expect("exchange should succeed");

    // One line per simulated millisecond; the CTRL cut-off fires 100 ms early.
    assert_eq!(reply.len(), 901);
    assert!(reply[0].is_ctrl());
}

#[test]
fn data_burst_without_ctrl_runs_to_deadline() {
    let clock = ManualClock::new();
    let burst: Vec<String> = (0..2000).map(|index| format!("TRACE:{index}")).collect();
    let link = ScriptedLink::new(clock.clone()).on("HOME:0", burst);

    let mut session = open_session(link, &clock).expect("session should open");
    let before = clock.now();
    let reply = session
        .send_quiet(Command::Home(0))
        .expect("exchange should succeed");

    assert_eq!(reply.len(), 1000);
    assert_eq!(clock.now() - before, Duration::from_secs(1));
}

#[test]
fn drop_closes_link_exactly_once() {
    let clock = ManualClock::new();
    let link = ScriptedLink::new(clock.clone());
    let handle = link.handle();

    {
        let mut session = open_session(link, &clock).expect("session should open");
        session.close();
        session.close();
        assert!(!handle.is_open());
    }

    assert_eq!(handle.close_calls(), 1);
}

#[test]
fn zero_ctrl_margin_collects_until_deadline() {
    let clock = ManualClock::new();
    let mut burst = vec!["CTRL:OK".to_string()];
    burst.extend((1..2000).map(|index| format!("TRACE:{index}")));
    let link = ScriptedLink::new(clock.clone()).on("HOME:0", burst);
    let config = SessionConfig::default().with_ctrl_margin(Duration::ZERO);

    let mut session =
        Session::connect_with_clock(link, clock.clone(), config).expect("session should open");
    let reply = session
        .send_quiet(Command::Home(0))
        .expect("exchange should succeed");
    assert_eq!(reply.len(), 1000);
}
