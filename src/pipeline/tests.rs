use super::accumulator::{LineAccumulator, Step};
use super::decoder::{DecodeRequest, Decoder, DecoderSignal};
use super::key_reader::KeyReader;
use super::renderer::{RenderContext, RenderJob, RenderTicket, Renderer};
use super::{Pipeline, PipelineSettings};
use crate::config::Timing;
use crate::gate::LineGate;
use crate::io::{Cell, RecordingScreen, ScreenEvent, ScriptedKeySource, READOUT_ORIGIN};
use crate::morse::MorsePattern;
use crate::signal::{mailbox, Control, Mailbox, WaitMode};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn fast_timing() -> Timing {
    Timing {
        dot: Duration::from_millis(1),
        pattern_gap: Duration::ZERO,
        render_idle: Duration::from_millis(50),
        poll: Duration::from_millis(1),
        backoff: Duration::from_millis(2),
    }
}

fn fast_settings(queue_capacity: usize) -> PipelineSettings {
    PipelineSettings {
        timing: fast_timing(),
        queue_capacity,
        sentinel: b'*',
    }
}

fn run_script(script: &[u8], queue_capacity: usize) -> RecordingScreen {
    let screen = RecordingScreen::new();
    let source = ScriptedKeySource::new(script.to_vec());
    let restored = source.restored_flag();
    let pipeline =
        Pipeline::spawn(source, screen.clone(), fast_settings(queue_capacity)).expect("spawn");
    pipeline.wait().expect("pipeline finishes cleanly");
    assert!(restored.load(Ordering::SeqCst), "key source restored");
    screen
}

fn lamp_events(screen: &RecordingScreen) -> Vec<bool> {
    screen
        .events()
        .into_iter()
        .filter_map(|event| match event {
            ScreenEvent::Lamp(lit) => Some(lit),
            _ => None,
        })
        .collect()
}

fn readout_by_row(screen: &RecordingScreen) -> Vec<(u16, String)> {
    let mut rows: Vec<(u16, String)> = Vec::new();
    for (cell, glyph) in screen.glyphs() {
        match rows.last_mut() {
            Some((row, text)) if *row == cell.row => text.push(glyph),
            _ => rows.push((cell.row, glyph.to_string())),
        }
    }
    rows
}

struct AccumulatorHarness {
    accumulator: LineAccumulator<RecordingScreen>,
    line_rx: Receiver<u8>,
    key_control: Mailbox<Control>,
    decoder: Mailbox<DecoderSignal>,
    jobs: Receiver<RenderJob>,
    tickets: Sender<RenderTicket>,
    screen: RecordingScreen,
    _keys: Sender<u8>,
}

fn accumulator_harness(capacity: usize) -> AccumulatorHarness {
    let (keys_tx, keys_rx) = bounded(capacity);
    let (line_tx, line_rx) = bounded(capacity);
    let (key_control_tx, key_control) = mailbox();
    let (decoder_tx, decoder) = mailbox();
    let (job_tx, jobs) = bounded(1);
    let (tickets, ticket_rx) = bounded(1);
    tickets
        .send(RenderTicket::new(RenderContext::new(READOUT_ORIGIN)))
        .expect("seed ticket");
    let screen = RecordingScreen::new();
    let accumulator = LineAccumulator::new(
        keys_rx,
        line_tx,
        key_control_tx,
        decoder_tx,
        job_tx,
        ticket_rx,
        LineGate::new(),
        screen.clone(),
        b'*',
    );
    AccumulatorHarness {
        accumulator,
        line_rx,
        key_control,
        decoder,
        jobs,
        tickets,
        screen,
        _keys: keys_tx,
    }
}

/// Stand-in decoder: takes `lines` requests, holds each permit for `hold`.
fn fake_decoder(
    decoder: Mailbox<DecoderSignal>,
    lines: usize,
    hold: Duration,
    released: Arc<AtomicBool>,
) -> thread::JoinHandle<Vec<usize>> {
    thread::spawn(move || {
        let mut counts = Vec::new();
        for _ in 0..lines {
            match decoder.wait(WaitMode::Forever) {
                Some(DecoderSignal::Decode(DecodeRequest { count, permit })) => {
                    counts.push(count);
                    thread::sleep(hold);
                    released.store(true, Ordering::SeqCst);
                    drop(permit);
                }
                other => panic!("unexpected decoder signal: {other:?}"),
            }
        }
        counts
    })
}

#[test]
fn accumulator_filters_and_counts_accepted_bytes() {
    let mut h = accumulator_harness(50);
    let steps: Vec<Step> = [b'A', 0x01, b'b', b' ', b'-', 0x1b, b'7']
        .into_iter()
        .map(|byte| h.accumulator.handle(byte).expect("handle"))
        .collect();
    assert_eq!(
        steps,
        vec![
            Step::Buffered,
            Step::Rejected,
            Step::Buffered,
            Step::Buffered,
            Step::Rejected,
            Step::Rejected,
            Step::Buffered,
        ]
    );
    assert_eq!(h.accumulator.count(), 4);
    let queued: Vec<u8> = h.line_rx.try_iter().collect();
    assert_eq!(queued, b"Ab 7".to_vec());
}

#[test]
fn accumulator_ignores_empty_line() {
    let mut h = accumulator_harness(50);
    assert_eq!(h.accumulator.handle(0x02).unwrap(), Step::Rejected);
    assert_eq!(h.accumulator.handle(b'\n').unwrap(), Step::EmptyLine);
    assert_eq!(h.accumulator.handle(b'\r').unwrap(), Step::EmptyLine);
    assert!(h.jobs.try_recv().is_err());
    assert_eq!(h.key_control.wait(WaitMode::Poll), None);
    assert!(!h.decoder.has_pending());
    assert!(h.screen.events().is_empty());
}

#[test]
fn accumulator_forwards_sentinel_without_suspending() {
    let mut h = accumulator_harness(50);
    assert_eq!(h.accumulator.handle(b'A').unwrap(), Step::Buffered);
    assert_eq!(h.accumulator.handle(b'*').unwrap(), Step::Terminate);
    assert_eq!(h.key_control.wait(WaitMode::Poll), Some(Control::Terminate));
    assert_eq!(h.accumulator.count(), 1);
    assert!(h.jobs.try_recv().is_err());
}

#[test]
fn accumulator_drops_uncounted_bytes_when_line_queue_full() {
    let mut h = accumulator_harness(2);
    assert_eq!(h.accumulator.handle(b'A').unwrap(), Step::Buffered);
    assert_eq!(h.accumulator.handle(b'B').unwrap(), Step::Buffered);
    assert_eq!(h.accumulator.handle(b'C').unwrap(), Step::Overflow);
    assert_eq!(h.accumulator.count(), 2);
    assert_eq!(h.line_rx.try_iter().collect::<Vec<_>>(), b"AB".to_vec());
}

#[test]
fn accumulator_waits_for_decoder_before_returning() {
    let mut h = accumulator_harness(50);
    let released = Arc::new(AtomicBool::new(false));
    let decoder = fake_decoder(
        h.decoder,
        1,
        Duration::from_millis(30),
        Arc::clone(&released),
    );

    h.accumulator.handle(b'S').unwrap();
    h.accumulator.handle(b'O').unwrap();
    let step = h.accumulator.handle(b'\n').unwrap();

    assert_eq!(step, Step::LineDecoded(2));
    assert!(
        released.load(Ordering::SeqCst),
        "accumulator resumed before the decoder released the line"
    );
    assert_eq!(h.accumulator.count(), 0);
    assert_eq!(decoder.join().expect("fake decoder"), vec![2]);
    assert_eq!(h.key_control.wait(WaitMode::Poll), Some(Control::BlockingRead));
    let job = h.jobs.try_recv().expect("render job sent");
    assert_eq!(job.line_len(), 2);
    assert!(h.screen.events().contains(&ScreenEvent::Cursor(false)));
}

#[test]
fn next_line_waits_for_render_ticket() {
    let mut h = accumulator_harness(50);
    let released = Arc::new(AtomicBool::new(false));
    let decoder = fake_decoder(h.decoder, 2, Duration::ZERO, released);

    h.accumulator.handle(b'E').unwrap();
    assert_eq!(h.accumulator.handle(b'\n').unwrap(), Step::LineDecoded(1));

    let jobs = h.jobs;
    let tickets = h.tickets;
    let returned = Arc::new(AtomicBool::new(false));
    let returned_clone = Arc::clone(&returned);
    let fake_renderer = thread::spawn(move || {
        let first = jobs.recv().expect("first job");
        thread::sleep(Duration::from_millis(40));
        returned_clone.store(true, Ordering::SeqCst);
        tickets.send(first.into_ticket()).expect("return ticket");
        jobs.recv().expect("second job")
    });

    h.accumulator.handle(b'T').unwrap();
    assert_eq!(h.accumulator.handle(b'\n').unwrap(), Step::LineDecoded(1));
    assert!(
        returned.load(Ordering::SeqCst),
        "second line started before the first render finished"
    );
    let second = fake_renderer.join().expect("fake renderer");
    assert_eq!(second.line_len(), 1);
    assert_eq!(decoder.join().expect("fake decoder"), vec![1, 1]);
}

struct DecoderHarness {
    decoder: Decoder,
    line_tx: Sender<u8>,
    line_rx: Receiver<u8>,
    patterns: Receiver<MorsePattern>,
    _signals: crate::signal::Notifier<DecoderSignal>,
}

fn decoder_harness(capacity: usize) -> DecoderHarness {
    let (signals_tx, signals_rx) = mailbox();
    let (line_tx, line_rx) = bounded(capacity);
    let (pattern_tx, patterns) = bounded(capacity);
    let decoder = Decoder::new(
        signals_rx,
        line_rx.clone(),
        pattern_tx,
        Duration::from_millis(1),
    );
    DecoderHarness {
        decoder,
        line_tx,
        line_rx,
        patterns,
        _signals: signals_tx,
    }
}

#[test]
fn decoder_drains_exactly_the_declared_count() {
    let h = decoder_harness(50);
    for byte in b"SOSE" {
        h.line_tx.send(*byte).unwrap();
    }
    let gate = LineGate::new();
    let permit = gate.acquire();
    let emitted = h
        .decoder
        .decode_line(DecodeRequest { count: 3, permit })
        .expect("decode");
    assert_eq!(emitted, 3);
    assert!(gate.is_idle());
    let patterns: Vec<_> = h.patterns.try_iter().collect();
    assert_eq!(patterns, vec!["... ", "--- ", "... "]);
    assert_eq!(h.line_rx.try_recv().ok(), Some(b'E'));
}

#[test]
fn decoder_skips_bytes_without_pattern() {
    let h = decoder_harness(50);
    h.line_tx.send(b'*').unwrap();
    h.line_tx.send(b'e').unwrap();
    let gate = LineGate::new();
    let emitted = h
        .decoder
        .decode_line(DecodeRequest {
            count: 2,
            permit: gate.acquire(),
        })
        .expect("decode");
    assert_eq!(emitted, 1);
    assert_eq!(h.patterns.try_iter().collect::<Vec<_>>(), vec![". "]);
    assert!(gate.is_idle());
}

#[test]
fn decoder_drains_a_line_that_fills_the_queue() {
    let h = decoder_harness(50);
    for _ in 0..50 {
        h.line_tx.try_send(b'T').expect("queue has room");
    }
    assert!(h.line_tx.try_send(b'T').is_err());
    let gate = LineGate::new();
    let emitted = h
        .decoder
        .decode_line(DecodeRequest {
            count: 50,
            permit: gate.acquire(),
        })
        .expect("decode");
    assert_eq!(emitted, 50);
    assert_eq!(h.patterns.len(), 50);
    assert!(h.line_rx.is_empty());
}

#[test]
fn decoder_run_exits_on_shutdown() {
    let (signals_tx, signals_rx) = mailbox();
    let (line_tx, line_rx) = bounded(4);
    let (pattern_tx, patterns) = bounded(4);
    let decoder = Decoder::new(signals_rx, line_rx, pattern_tx, Duration::from_millis(1));
    let handle = thread::spawn(move || decoder.run());

    let gate = LineGate::new();
    line_tx.send(b'A').unwrap();
    signals_tx.post(DecoderSignal::Decode(DecodeRequest {
        count: 1,
        permit: gate.acquire(),
    }));
    gate.wait_idle();
    assert_eq!(patterns.recv_timeout(Duration::from_secs(1)).ok(), Some(".- "));

    signals_tx.post(DecoderSignal::Shutdown);
    handle.join().expect("decoder thread").expect("decoder result");
}

struct RendererHarness {
    renderer: Renderer<RecordingScreen>,
    patterns: Sender<MorsePattern>,
    key_control_tx: crate::signal::Notifier<Control>,
    key_control: Mailbox<Control>,
    screen: RecordingScreen,
    _jobs: Sender<RenderJob>,
    _tickets: Receiver<RenderTicket>,
}

fn renderer_harness(timing: Timing) -> RendererHarness {
    let (jobs_tx, jobs_rx) = bounded(1);
    let (tickets_tx, tickets_rx) = bounded(1);
    let (pattern_tx, pattern_rx) = bounded(50);
    let (key_control_tx, key_control) = mailbox();
    let screen = RecordingScreen::new();
    let renderer = Renderer::new(
        jobs_rx,
        tickets_tx,
        pattern_rx,
        key_control_tx.clone(),
        screen.clone(),
        timing,
    );
    RendererHarness {
        renderer,
        patterns: pattern_tx,
        key_control_tx,
        key_control,
        screen,
        _jobs: jobs_tx,
        _tickets: tickets_rx,
    }
}

fn origin_job(line_len: usize) -> RenderJob {
    RenderJob::new(
        RenderTicket::new(RenderContext::new(READOUT_ORIGIN)),
        line_len,
    )
}

#[test]
fn renderer_blinks_dot_then_dash_for_a() {
    let timing = Timing {
        dot: Duration::from_millis(10),
        ..fast_timing()
    };
    let mut h = renderer_harness(timing);
    h.patterns.send(".- ").unwrap();

    let ticket = h.renderer.render_job(origin_job(1));

    assert_eq!(lamp_events(&h.screen), vec![true, false, true, false, false]);
    assert_eq!(
        h.screen.glyphs(),
        vec![
            (Cell { column: 2, row: 4 }, '.'),
            (Cell { column: 3, row: 4 }, '-'),
            (Cell { column: 4, row: 4 }, ' '),
        ]
    );
    assert_eq!(ticket.context().cursor(), Cell { column: 2, row: 5 });
    assert_eq!(h.key_control.wait(WaitMode::Poll), Some(Control::Reset));

    let lamp_times: Vec<(Instant, bool)> = h
        .screen
        .timed_events()
        .into_iter()
        .filter_map(|(at, event)| match event {
            ScreenEvent::Lamp(lit) => Some((at, lit)),
            _ => None,
        })
        .collect();
    let dot_on = lamp_times[1].0 - lamp_times[0].0;
    let dash_on = lamp_times[3].0 - lamp_times[2].0;
    assert!(dot_on >= timing.dot);
    assert!(dash_on >= timing.dash());
}

#[test]
fn renderer_times_out_on_empty_queue() {
    let mut h = renderer_harness(fast_timing());
    let start = Instant::now();
    let ticket = h.renderer.render_job(origin_job(0));
    assert!(start.elapsed() >= fast_timing().render_idle);
    assert!(lamp_events(&h.screen).is_empty());
    assert_eq!(ticket.context().cursor(), Cell { column: 2, row: 5 });
    assert_eq!(h.key_control.wait(WaitMode::Poll), Some(Control::Reset));
}

#[test]
fn renderer_reset_does_not_hide_pending_terminate() {
    let mut h = renderer_harness(fast_timing());
    h.key_control_tx.post(Control::Terminate);
    let _ticket = h.renderer.render_job(origin_job(0));
    assert_eq!(h.key_control.wait(WaitMode::Poll), Some(Control::Terminate));
}

#[test]
fn renderer_continues_row_across_patterns() {
    let mut h = renderer_harness(fast_timing());
    h.patterns.send("... ").unwrap();
    h.patterns.send("--- ").unwrap();
    let ticket = h.renderer.render_job(origin_job(2));
    assert_eq!(h.screen.readout(), "... --- ");
    assert!(h.screen.glyphs().iter().all(|(cell, _)| cell.row == 4));
    assert_eq!(h.screen.glyphs().last().map(|(c, _)| c.column), Some(9));
    assert_eq!(ticket.context().cursor().row, 5);
}

fn key_reader_with(
    source: ScriptedKeySource,
    capacity: usize,
) -> (
    KeyReader<ScriptedKeySource, RecordingScreen>,
    Receiver<u8>,
    crate::signal::Notifier<Control>,
    RecordingScreen,
) {
    let (keys_tx, keys_rx) = bounded(capacity);
    let (control_tx, control_rx) = mailbox();
    let screen = RecordingScreen::new();
    let reader = KeyReader::new(source, screen.clone(), keys_tx, control_rx, fast_timing());
    (reader, keys_rx, control_tx, screen)
}

#[test]
fn key_reader_forwards_bytes_until_input_closes() {
    let source = ScriptedKeySource::new(b"AB\n".to_vec());
    let restored = source.restored_flag();
    let (reader, keys, _control, screen) = key_reader_with(source, 8);
    reader.run().expect("key reader");
    assert_eq!(keys.try_iter().collect::<Vec<_>>(), b"AB\n".to_vec());
    assert!(restored.load(Ordering::SeqCst));
    assert_eq!(screen.events(), vec![ScreenEvent::Cursor(true)]);
}

#[test]
fn key_reader_backs_off_without_losing_keystrokes() {
    let source = ScriptedKeySource::new(b"ABC".to_vec());
    let (reader, keys, _control, _screen) = key_reader_with(source, 1);
    let handle = thread::spawn(move || reader.run());

    thread::sleep(Duration::from_millis(20));
    let mut received = Vec::new();
    while received.len() < 3 {
        let byte = keys
            .recv_timeout(Duration::from_secs(1))
            .expect("keystroke delivered");
        received.push(byte);
    }
    handle.join().expect("reader thread").expect("reader result");
    assert_eq!(received, b"ABC".to_vec());
    assert!(keys.try_recv().is_err(), "no duplicated keystrokes");
}

#[test]
fn key_reader_stops_polling_in_blocking_mode() {
    let source = ScriptedKeySource::new(b"A".to_vec()).held_open();
    let (reader, keys, control, _screen) = key_reader_with(source, 8);
    control.post(Control::BlockingRead);
    let handle = thread::spawn(move || reader.run());

    assert!(keys.recv_timeout(Duration::from_millis(40)).is_err());
    control.post(Control::Reset);
    assert_eq!(keys.recv_timeout(Duration::from_secs(1)).ok(), Some(b'A'));

    control.post(Control::Terminate);
    handle.join().expect("reader thread").expect("reader result");
}

#[test]
fn key_reader_terminates_while_blocking() {
    let source = ScriptedKeySource::new(Vec::new()).held_open();
    let restored = source.restored_flag();
    let (reader, _keys, control, screen) = key_reader_with(source, 8);
    control.post(Control::BlockingRead);
    let handle = thread::spawn(move || reader.run());
    thread::sleep(Duration::from_millis(10));
    control.post(Control::Terminate);
    handle.join().expect("reader thread").expect("reader result");
    assert!(restored.load(Ordering::SeqCst));
    assert!(screen.events().contains(&ScreenEvent::Cursor(true)));
}

#[test]
fn pipeline_renders_sos() {
    let screen = run_script(b"SOS\n", 50);
    assert_eq!(screen.readout(), "... --- ... ");
    assert_eq!(readout_by_row(&screen), vec![(4, "... --- ... ".to_string())]);
    let lit = lamp_events(&screen).into_iter().filter(|lit| *lit).count();
    assert_eq!(lit, 9);
    let events = screen.events();
    assert!(events.contains(&ScreenEvent::Cursor(false)));
    assert!(events.contains(&ScreenEvent::Cursor(true)));
}

#[test]
fn pipeline_output_is_repeatable() {
    let first = run_script(b"SOS\n", 50);
    let second = run_script(b"SOS\n", 50);
    assert_eq!(first.glyphs(), second.glyphs());
    assert_eq!(lamp_events(&first), lamp_events(&second));
}

#[test]
fn pipeline_puts_each_line_on_its_own_row() {
    let screen = run_script(b"HI\nE\n", 50);
    assert_eq!(
        readout_by_row(&screen),
        vec![(4, ".... .. ".to_string()), (5, ". ".to_string())]
    );
}

#[test]
fn pipeline_renders_space_as_word_gap() {
    let screen = run_script(b"E E\n", 50);
    assert_eq!(screen.readout(), ".   . ");
}

#[test]
fn pipeline_ignores_line_of_invalid_bytes() {
    let screen = run_script(b"\x01\x1b\x7f\n", 50);
    assert!(lamp_events(&screen).is_empty());
    assert!(!screen.events().contains(&ScreenEvent::Cursor(false)));
    assert!(screen.glyphs().is_empty());
}

#[test]
fn pipeline_stops_on_sentinel_mid_line() {
    let screen = RecordingScreen::new();
    let source = ScriptedKeySource::new(b"AB*".to_vec()).held_open();
    let restored = source.restored_flag();
    let pipeline = Pipeline::spawn(source, screen.clone(), fast_settings(50)).expect("spawn");
    pipeline.wait().expect("pipeline finishes cleanly");
    assert!(restored.load(Ordering::SeqCst));
    assert!(lamp_events(&screen).is_empty());
    assert!(screen.events().contains(&ScreenEvent::Cursor(true)));
}

#[test]
fn pipeline_handles_line_that_fills_queue_capacity() {
    let screen = run_script(b"EEEE\n", 4);
    assert_eq!(screen.readout(), ". . . . ");
}

#[test]
fn pipeline_rejects_zero_capacity() {
    let result = Pipeline::spawn(
        ScriptedKeySource::new(Vec::new()),
        RecordingScreen::new(),
        fast_settings(0),
    );
    assert!(result.is_err());
}
