use asiopanel::hal::mock::{SimulatedDevice, SimulatedPropertySource};
use asiopanel::panel::{PanelEvent, ReconcileOutcome, NO_DEVICES_PLACEHOLDER};
use asiopanel::{AsioPanel, PanelConfig};
use std::sync::Arc;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::broadcast::Receiver;
use tokio::time::{sleep, Duration};

fn config() -> PanelConfig {
    PanelConfig {
        poll_interval_ms: 0,
        diagnostic: false,
        event_capacity: 64,
    }
}

fn polling_config() -> PanelConfig {
    PanelConfig {
        poll_interval_ms: 1000,
        ..config()
    }
}

fn devices() -> SimulatedPropertySource {
    let source = SimulatedPropertySource::with_devices([
        SimulatedDevice::new("usb#a", "Interface A"),
        SimulatedDevice::new("usb#b", "Interface B")
            .with_rates(0x1f8)
            .with_sample_rate(96000)
            .with_buffer_size(128),
    ]);
    source.set_designated_path("usb#b");
    source
}

fn source() -> Arc<SimulatedPropertySource> {
    Arc::new(devices())
}

fn drain(events: &mut Receiver<PanelEvent>) -> Vec<PanelEvent> {
    let mut seen = Vec::new();
    loop {
        match events.try_recv() {
            Ok(event) => seen.push(event),
            Err(TryRecvError::Empty) => return seen,
            Err(e) => panic!("event stream broken: {:?}", e),
        }
    }
}

const FULL_PASS: [PanelEvent; 6] = [
    PanelEvent::Devices,
    PanelEvent::DeviceSelectedIndex,
    PanelEvent::SampleRates,
    PanelEvent::SampleRateSelectedIndex,
    PanelEvent::BufferSizes,
    PanelEvent::BufferSizeSelectedIndex,
];

#[tokio::test]
async fn test_load_selects_designated_device() {
    let source = source();
    let panel = AsioPanel::start(source.clone(), &config());
    let mut events = panel.subscribe();

    assert_eq!(panel.load_initial_state().await, ReconcileOutcome::Applied);

    let snapshot = panel.snapshot().await.unwrap();
    assert_eq!(snapshot.device_names, vec!["Interface A", "Interface B"]);
    assert_eq!(snapshot.selected_device_name(), Some("Interface B"));
    assert_eq!(
        snapshot.sample_rates,
        vec![192000, 176400, 96000, 88200, 48000, 44100]
    );
    assert_eq!(snapshot.selected_sample_rate(), Some(96000));
    // 128 frames at the 2x coefficient
    assert_eq!(snapshot.selected_buffer_size(), Some(256));
    assert_eq!(snapshot.buffer_sizes[0], 4096);

    assert_eq!(drain(&mut events), FULL_PASS);
}

#[tokio::test]
async fn test_load_without_designated_path_selects_first() {
    let source = source();
    source.set_designated_path("");

    let panel = AsioPanel::start(source.clone(), &config());
    panel.load_initial_state().await;

    let snapshot = panel.snapshot().await.unwrap();
    assert_eq!(snapshot.selection.device, Some(0));
    assert_eq!(snapshot.sample_rates, vec![48000, 44100]);
    assert_eq!(snapshot.selected_buffer_size(), Some(256));
}

#[tokio::test]
async fn test_load_with_failed_enumeration() {
    let source = source();
    source.fail_enumeration(true);

    let panel = AsioPanel::start(source.clone(), &config());
    assert_eq!(panel.load_initial_state().await, ReconcileOutcome::Applied);

    let snapshot = panel.snapshot().await.unwrap();
    assert!(snapshot.device_names.is_empty());
    assert!(snapshot.sample_rates.is_empty());
    assert!(snapshot.buffer_sizes.is_empty());
    assert_eq!(snapshot.selection.device, None);

    // The next notification recovers
    source.fail_enumeration(false);
    assert_eq!(panel.device_changed().await, ReconcileOutcome::Applied);
    let snapshot = panel.snapshot().await.unwrap();
    assert_eq!(snapshot.selected_device_name(), Some("Interface B"));
}

#[tokio::test]
async fn test_diagnostic_placeholder_when_empty() {
    let source = Arc::new(SimulatedPropertySource::new());
    let diagnostic = PanelConfig {
        diagnostic: true,
        ..config()
    };

    let panel = AsioPanel::start(source.clone(), &diagnostic);
    panel.load_initial_state().await;

    let snapshot = panel.snapshot().await.unwrap();
    assert_eq!(snapshot.device_names, vec![NO_DEVICES_PLACEHOLDER]);
    assert_eq!(snapshot.selection.device, Some(0));
    assert_eq!(snapshot.selection.sample_rate, None);
    assert!(snapshot.buffer_sizes.is_empty());
}

#[tokio::test]
async fn test_unchanged_notification_is_silent() {
    let source = source();
    let panel = AsioPanel::start(source.clone(), &config());
    panel.load_initial_state().await;
    let mut events = panel.subscribe();

    assert_eq!(panel.device_changed().await, ReconcileOutcome::Unchanged);
    assert!(drain(&mut events).is_empty());
}

#[tokio::test]
async fn test_hot_plug_keeps_selection_and_buffer_choice() {
    let source = source();
    let panel = AsioPanel::start(source.clone(), &config());
    panel.load_initial_state().await;
    assert!(panel.set_buffer_size_index(Some(3)).await);
    let mut events = panel.subscribe();

    source.plug(SimulatedDevice::new("usb#c", "Interface C"));
    assert_eq!(panel.device_changed().await, ReconcileOutcome::Applied);

    let snapshot = panel.snapshot().await.unwrap();
    assert_eq!(snapshot.device_names.len(), 3);
    assert_eq!(snapshot.selected_device_name(), Some("Interface B"));
    assert_eq!(snapshot.selection.buffer_size, Some(3));
    assert_eq!(drain(&mut events), FULL_PASS);
}

#[tokio::test]
async fn test_unplugging_selected_device_falls_back_to_first() {
    let source = source();
    let panel = AsioPanel::start(source.clone(), &config());
    panel.load_initial_state().await;

    source.unplug("usb#b");
    assert_eq!(panel.device_changed().await, ReconcileOutcome::Applied);

    let snapshot = panel.snapshot().await.unwrap();
    assert_eq!(snapshot.device_names, vec!["Interface A"]);
    assert_eq!(snapshot.selection.device, Some(0));
    assert_eq!(snapshot.selected_sample_rate(), Some(48000));
}

#[tokio::test]
async fn test_user_edits_through_owner() {
    let source = source();
    let panel = AsioPanel::start(source.clone(), &config());
    panel.load_initial_state().await;
    let mut events = panel.subscribe();

    assert!(panel.set_device_index(0).await);
    assert_eq!(
        drain(&mut events),
        [
            PanelEvent::DeviceSelectedIndex,
            PanelEvent::SampleRates,
            PanelEvent::SampleRateSelectedIndex,
            PanelEvent::BufferSizes,
            PanelEvent::BufferSizeSelectedIndex,
        ]
    );

    // Same index, out of range, or unchanged: nothing happens
    assert!(!panel.set_device_index(0).await);
    assert!(!panel.set_device_index(2).await);
    assert!(!panel.set_sample_rate_index(Some(3)).await);
    assert!(!panel.set_buffer_size_index(Some(13)).await);
    assert!(drain(&mut events).is_empty());

    // One past the end marks the rate unlisted
    assert!(panel.set_sample_rate_index(Some(2)).await);
    assert!(panel.snapshot().await.unwrap().sample_rate_unlisted());

    assert!(panel.set_buffer_size_index(None).await);
    assert_eq!(panel.snapshot().await.unwrap().selection.buffer_size, None);
}

#[tokio::test(start_paused = true)]
async fn test_poll_timer_picks_up_external_rate_change() {
    let source = source();
    let panel = AsioPanel::start(source.clone(), &polling_config());
    panel.load_initial_state().await;

    source.set_external_sample_rate("usb#b", 192000);
    sleep(Duration::from_millis(1500)).await;

    let snapshot = panel.snapshot().await.unwrap();
    assert_eq!(snapshot.selected_sample_rate(), Some(192000));
    // Buffer index survives, values rescale to 4x
    assert_eq!(snapshot.selected_buffer_size(), Some(512));
    assert_eq!(source.enumeration_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_poll_timer_without_drift_does_not_enumerate() {
    let source = source();
    let panel = AsioPanel::start(source.clone(), &polling_config());
    panel.load_initial_state().await;

    sleep(Duration::from_millis(5500)).await;
    assert_eq!(source.enumeration_count(), 1);
    assert!(!panel.is_disposed());
}

#[tokio::test(start_paused = true)]
async fn test_dispose_stops_polling() {
    let source = source();
    let panel = AsioPanel::start(source.clone(), &polling_config());
    panel.load_initial_state().await;

    panel.dispose();
    panel.dispose();
    assert!(panel.is_disposed());

    source.set_external_sample_rate("usb#b", 192000);
    sleep(Duration::from_secs(5)).await;

    assert_eq!(source.enumeration_count(), 1);
    let snapshot = panel.snapshot().await.unwrap();
    assert_eq!(snapshot.selected_sample_rate(), Some(96000));
}

#[tokio::test(start_paused = true)]
async fn test_dispose_discards_in_flight_reconciliation() {
    let source = Arc::new(devices().with_latency(Duration::from_millis(100)));
    let panel = Arc::new(AsioPanel::start(source.clone(), &config()));
    panel.load_initial_state().await;

    source.plug(SimulatedDevice::new("usb#c", "Interface C"));
    let worker = {
        let panel = Arc::clone(&panel);
        tokio::spawn(async move { panel.device_changed().await })
    };

    // Enumeration is still sleeping in the worker
    sleep(Duration::from_millis(10)).await;
    panel.dispose();

    assert_eq!(worker.await.unwrap(), ReconcileOutcome::Discarded);
    assert_eq!(source.enumeration_count(), 2);

    let snapshot = panel.snapshot().await.unwrap();
    assert_eq!(snapshot.device_names.len(), 2);
}

#[tokio::test]
async fn test_hook_notifies_from_foreign_thread() {
    let source = source();
    let panel = AsioPanel::start(source.clone(), &config());
    panel.load_initial_state().await;
    let hook = panel.device_change_hook();

    source.plug(SimulatedDevice::new("usb#c", "Interface C"));
    let notified = std::thread::spawn(move || hook.notify()).join().unwrap();

    assert_eq!(notified.await.unwrap(), ReconcileOutcome::Applied);
    assert_eq!(panel.snapshot().await.unwrap().device_names.len(), 3);
}

#[tokio::test]
async fn test_drop_disposes_panel() {
    let source = source();
    let panel = AsioPanel::start(source.clone(), &config());
    panel.load_initial_state().await;
    let hook = panel.device_change_hook();
    drop(panel);

    source.plug(SimulatedDevice::new("usb#c", "Interface C"));
    assert_eq!(hook.notify().await.unwrap(), ReconcileOutcome::Discarded);
}

fn slow_source() -> Arc<SimulatedPropertySource> {
    Arc::new(devices().with_latency(Duration::from_millis(100)))
}

fn rebuild_passes(events: &[PanelEvent]) -> usize {
    events.iter().filter(|e| **e == PanelEvent::Devices).count()
}

#[tokio::test]
async fn test_oversized_buffer_report_keeps_owner_alive() {
    let source = Arc::new(SimulatedPropertySource::with_devices([SimulatedDevice::new(
        "usb#huge", "Huge Buffer",
    )
    .with_rates(0x1f8)
    .with_sample_rate(96000)
    .with_buffer_size(0x8000_0000)]));

    let panel = AsioPanel::start(source.clone(), &config());
    assert_eq!(panel.load_initial_state().await, ReconcileOutcome::Applied);

    let snapshot = panel.snapshot().await.unwrap();
    assert_eq!(snapshot.selected_sample_rate(), Some(96000));
    assert_eq!(snapshot.selection.buffer_size, None);
    assert!(panel.set_buffer_size_index(Some(0)).await);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_notifications_rebuild_once() {
    let source = slow_source();
    let panel = AsioPanel::start(source.clone(), &config());
    panel.load_initial_state().await;
    let mut events = panel.subscribe();

    source.plug(SimulatedDevice::new("usb#c", "Interface C"));
    let (first, second) = tokio::join!(panel.device_changed(), panel.device_changed());

    let mut outcomes = [first, second];
    outcomes.sort_by_key(|o| *o == ReconcileOutcome::Unchanged);
    assert_eq!(outcomes, [ReconcileOutcome::Applied, ReconcileOutcome::Unchanged]);
    assert_eq!(rebuild_passes(&drain(&mut events)), 1);

    // The panel holds the newest handles, so polling still reads the device
    assert_eq!(panel.poll_now().await, ReconcileOutcome::Unchanged);
    source.set_external_sample_rate("usb#b", 192000);
    assert_eq!(panel.poll_now().await, ReconcileOutcome::Applied);
}

#[tokio::test(start_paused = true)]
async fn test_user_edit_during_pending_notification_survives() {
    let source = slow_source();
    let panel = AsioPanel::start(source.clone(), &config());
    panel.load_initial_state().await;
    assert_eq!(
        panel.snapshot().await.unwrap().selected_device_name(),
        Some("Interface B")
    );

    source.plug(SimulatedDevice::new("usb#c", "Interface C"));
    let (outcome, edited) = tokio::join!(panel.device_changed(), async {
        // Enumeration is still sleeping when the user picks A
        sleep(Duration::from_millis(10)).await;
        panel.set_device_index(0).await
    });

    assert!(edited);
    assert_eq!(outcome, ReconcileOutcome::Applied);

    let snapshot = panel.snapshot().await.unwrap();
    assert_eq!(snapshot.device_names.len(), 3);
    assert_eq!(snapshot.selected_device_name(), Some("Interface A"));
    assert_eq!(snapshot.selected_sample_rate(), Some(48000));
}

#[tokio::test(start_paused = true)]
async fn test_poll_and_notification_in_flight_together() {
    let source = slow_source();
    let panel = AsioPanel::start(source.clone(), &config());
    panel.load_initial_state().await;
    let mut events = panel.subscribe();

    source.set_external_sample_rate("usb#b", 192000);
    let (polled, changed) = tokio::join!(panel.poll_now(), panel.device_changed());

    assert_eq!(changed, ReconcileOutcome::Applied);
    assert_eq!(polled, ReconcileOutcome::Unchanged);

    let seen = drain(&mut events);
    assert_eq!(seen, FULL_PASS);
    assert_eq!(rebuild_passes(&seen), 1);

    let snapshot = panel.snapshot().await.unwrap();
    assert_eq!(snapshot.device_names.len(), 2);
    assert_eq!(snapshot.selected_device_name(), Some("Interface B"));
    assert_eq!(snapshot.selected_sample_rate(), Some(192000));
    assert_eq!(snapshot.selected_buffer_size(), Some(512));
}
