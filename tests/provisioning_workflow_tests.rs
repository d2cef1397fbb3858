//! End-to-end runs of the workflow steps against in-memory collaborators

mod common;

use common::{Fixture, SCAN_NAME};
use std::sync::Arc;
use std::time::Duration;
use tag_provisioning::constants::codes;
use tag_provisioning::events::{
    BroadcastNotificationSink, FanOutNotificationSink, NotificationSink, TracingNotificationSink,
};
use tag_provisioning::orchestration::{
    HostServices, ProvisioningOrchestrator, StepDisposition, StepKind, StepOutcome,
};
use tag_provisioning::services::TagStatus;
use tag_provisioning::state_machine::{EntityStatus, Transition};
use tag_provisioning::test_helpers::{
    channel_parameters, provision_parameters, scanner_parameters,
};
use tag_provisioning::ProvisioningConfig;
use uuid::Uuid;

const URL_ONE: &str = "http://origin/one.m3u8";
const URL_TWO: &str = "http://origin/two.m3u8";

#[tokio::test(start_paused = true)]
async fn test_scanner_provisioning_end_to_end() {
    let fixture = Fixture::new();
    let provision = fixture.provision(EntityStatus::InProgress);
    let scanner = fixture.scanner(
        SCAN_NAME,
        EntityStatus::InProgress,
        &[("BBC One", URL_ONE), ("BBC Two", URL_TWO)],
    );
    let one = fixture.channel("BBC One", EntityStatus::InProgress, Some("Grid A"));
    let two = fixture.channel("BBC Two", EntityStatus::InProgress, Some("Grid A"));
    fixture.set_scan_table(vec![
        vec![Fixture::finished_scan("Morning Sweep BBC One", URL_ONE)],
        vec![
            Fixture::finished_scan("Morning Sweep BBC One", URL_ONE),
            Fixture::finished_scan("Morning Sweep BBC Two", URL_TWO),
        ],
    ]);
    fixture.set_layout(&[("Grid A", 1, ""), ("Grid A", 2, ""), ("Grid A", 3, "")]);

    let orchestrator = fixture.harness.orchestrator();
    let scanner_params = scanner_parameters(scanner, SCAN_NAME, &[one, two]);

    // Scans finish, channels get laid out and launched
    let report = orchestrator
        .run_step(StepKind::MonitorScannerProgress, &scanner_params)
        .await;
    assert_eq!(report.outcome, StepOutcome::Success);
    assert_eq!(fixture.harness.launcher.launched(), vec![scanner]);
    let one_record = fixture.harness.store.record(one).unwrap();
    let two_record = fixture.harness.store.record(two).unwrap();
    assert_eq!(one_record.layouts[0].position.as_deref(), Some("Grid A/1"));
    assert_eq!(two_record.layouts[0].position.as_deref(), Some("Grid A/2"));

    // Channel processes settle on their own
    fixture
        .harness
        .store
        .script_statuses(one, [EntityStatus::InProgress, EntityStatus::Active]);
    fixture
        .harness
        .store
        .script_statuses(two, [EntityStatus::Active]);

    let report = orchestrator
        .run_step(StepKind::MonitorChannelsProgress, &scanner_params)
        .await;
    assert_eq!(report.outcome, StepOutcome::Finished);
    assert_eq!(fixture.status(scanner), Some(EntityStatus::Active));

    let report = orchestrator
        .run_step(
            StepKind::MonitorScanners,
            &provision_parameters(provision, "provision", &[scanner]),
        )
        .await;
    assert_eq!(report.transitions, vec![Transition::InProgressToActive]);
    assert_eq!(fixture.status(provision), Some(EntityStatus::Active));
    assert!(fixture.harness.incidents.incidents().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_two_scanners_one_failed_names_it() {
    let fixture = Fixture::new();
    let provision = fixture.provision(EntityStatus::InProgress);
    let north = fixture.scanner("North", EntityStatus::Active, &[]);
    let south = fixture.scanner("South", EntityStatus::InProgress, &[]);
    fixture
        .harness
        .store
        .script_statuses(south, [EntityStatus::InProgress, EntityStatus::Error]);

    let report = fixture
        .harness
        .orchestrator()
        .monitor_scanners(&provision_parameters(provision, "provision", &[north, south]))
        .await;

    assert_eq!(report.outcome, StepOutcome::Finished);
    assert_eq!(
        fixture.status(provision),
        Some(EntityStatus::ActiveWithErrors)
    );
    let incident = fixture
        .harness
        .incidents
        .find(codes::PARTIAL_SCAN_PROVISION_ERROR)
        .unwrap();
    assert_eq!(incident.affected_item, "South scans");
}

#[tokio::test(start_paused = true)]
async fn test_every_scanner_failed_errors_provision() {
    let fixture = Fixture::new();
    let provision = fixture.provision(EntityStatus::InProgress);
    let north = fixture.scanner("North", EntityStatus::Error, &[]);
    let south = fixture.scanner("South", EntityStatus::Error, &[]);

    let report = fixture
        .harness
        .orchestrator()
        .monitor_scanners(&provision_parameters(provision, "provision", &[north, south]))
        .await;

    assert_eq!(report.transitions, vec![Transition::InProgressToError]);
    assert_eq!(
        report.disposition,
        StepDisposition::TotalChildFailure {
            failed: vec!["North".to_string(), "South".to_string()]
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_steps_on_completed_records_are_no_ops() {
    let fixture = Fixture::new();
    let provision = fixture.provision(EntityStatus::Complete);
    let scanner = fixture.scanner(SCAN_NAME, EntityStatus::Complete, &[("BBC One", URL_ONE)]);
    let orchestrator = fixture.harness.orchestrator();
    let scanner_params = scanner_parameters(scanner, SCAN_NAME, &[]);

    for step in [
        StepKind::DeactivateScanner,
        StepKind::MonitorScannerProgress,
        StepKind::MonitorChannelsProgress,
    ] {
        let report = orchestrator.run_step(step, &scanner_params).await;
        assert_eq!(report.outcome, StepOutcome::Success, "{step}");
        assert!(!report.escalated(), "{step}");
    }

    let report = orchestrator
        .run_step(
            StepKind::MonitorScanners,
            &provision_parameters(provision, "provision", &[scanner]),
        )
        .await;
    assert_eq!(report.outcome, StepOutcome::Success);

    assert!(fixture.harness.store.transitions_of(scanner).is_empty());
    assert!(fixture.harness.store.transitions_of(provision).is_empty());
    assert!(fixture.harness.device.writes().is_empty());
    assert!(fixture.harness.incidents.incidents().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_timeouts_escalate_with_short_configuration() {
    let fixture = Fixture::new();
    let mut config = ProvisioningConfig::default();
    config.retry.poll_interval_ms = 100;
    config.retry.scan_timeout_seconds = 1;
    let scanner = fixture.scanner(SCAN_NAME, EntityStatus::InProgress, &[("BBC One", URL_ONE)]);

    let started = tokio::time::Instant::now();
    let report = fixture
        .harness
        .orchestrator_with(config)
        .monitor_scanner_progress(&scanner_parameters(scanner, SCAN_NAME, &[]))
        .await;

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(1));
    assert!(elapsed < Duration::from_secs(2));
    assert_eq!(
        report.disposition,
        StepDisposition::ConvergenceTimeout { timeout_seconds: 1 }
    );
    assert_eq!(fixture.status(scanner), Some(EntityStatus::Error));
}

#[tokio::test(start_paused = true)]
async fn test_deactivation_end_to_end() {
    let fixture = Fixture::new();
    let provision = fixture.provision(EntityStatus::Deactivating);
    let scanner = fixture.scanner(SCAN_NAME, EntityStatus::Deactivate, &[("BBC One", URL_ONE)]);
    let channel = fixture.channel("BBC One", EntityStatus::Deactivate, Some("Grid A"));
    fixture.set_layout(&[("Grid A", 1, "BBC One HD"), ("Grid A", 2, "")]);
    fixture.set_scan_table(vec![
        vec![Fixture::finished_scan("Morning Sweep BBC One #RES|BAND#", URL_ONE)],
        vec![],
    ]);

    let orchestrator = fixture.harness.orchestrator();

    let report = orchestrator
        .run_step(StepKind::ClearLayout, &channel_parameters(channel, "BBC One HD"))
        .await;
    assert_eq!(report.outcome, StepOutcome::Success);
    assert_eq!(fixture.status(channel), Some(EntityStatus::Deactivating));
    assert_eq!(
        fixture.harness.device.cell_writes(),
        vec![(10353, "Grid A/1".to_string(), "0".to_string())]
    );

    // The channel's own process finishes its teardown before the scanner is retired
    fixture
        .harness
        .store
        .script_statuses(channel, [EntityStatus::Active]);

    let report = orchestrator
        .run_step(
            StepKind::DeactivateScanner,
            &scanner_parameters(scanner, SCAN_NAME, &[channel]),
        )
        .await;
    assert_eq!(report.outcome, StepOutcome::Finished);
    assert_eq!(fixture.status(scanner), Some(EntityStatus::Complete));
    assert_eq!(fixture.status(channel), Some(EntityStatus::Complete));

    let report = orchestrator
        .run_step(
            StepKind::MonitorScanners,
            &provision_parameters(provision, "deactivate", &[scanner])
                .with_text(
                    tag_provisioning::constants::parameters::PROVISION_SOURCE_ELEMENT,
                    "12/345/1001",
                )
                .with_text(
                    tag_provisioning::constants::parameters::PROVISION_SOURCE_ID,
                    "Evening News",
                ),
        )
        .await;
    assert_eq!(report.transitions, vec![Transition::DeactivatingToComplete]);
    assert_eq!(fixture.status(provision), Some(EntityStatus::Complete));

    let sent = fixture.harness.forwarder.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1.process_response.tag.status, TagStatus::Complete);
    assert!(fixture.harness.incidents.incidents().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unreadable_record_finishes_without_escalation() {
    let fixture = Fixture::new();
    let scanner = fixture.scanner(SCAN_NAME, EntityStatus::InProgress, &[]);
    fixture.harness.store.fail_reads_of(scanner);

    let report = fixture
        .harness
        .orchestrator()
        .monitor_channels_progress(&scanner_parameters(scanner, SCAN_NAME, &[]))
        .await;

    // Nothing was observed, so there is no status to escalate from
    assert_eq!(report.outcome, StepOutcome::Finished);
    assert!(report.escalation.is_empty());
    assert!(fixture
        .harness
        .incidents
        .find(codes::UNHANDLED_FAULT)
        .is_some());
}

#[tokio::test(start_paused = true)]
async fn test_missing_parameters_fault_without_touching_records() {
    let fixture = Fixture::new();
    let scanner = fixture.scanner(SCAN_NAME, EntityStatus::InProgress, &[]);
    let params = tag_provisioning::orchestration::StepParameters::new().with_guid(
        tag_provisioning::constants::parameters::SCAN_INSTANCE_ID,
        scanner,
    );

    let report = fixture
        .harness
        .orchestrator()
        .monitor_scanner_progress(&params)
        .await;

    assert!(matches!(
        report.disposition,
        StepDisposition::UnhandledFault { .. }
    ));
    assert_eq!(report.entity_id, None);
    assert_eq!(fixture.status(scanner), Some(EntityStatus::InProgress));
}

#[tokio::test(start_paused = true)]
async fn test_incidents_fan_out_to_broadcast_subscribers() {
    let fixture = Fixture::new();
    let broadcast = Arc::new(BroadcastNotificationSink::default());
    let mut receiver = broadcast.subscribe();
    let sinks: Vec<Arc<dyn NotificationSink>> = vec![
        fixture.harness.incidents.clone(),
        broadcast.clone(),
        Arc::new(TracingNotificationSink),
    ];
    let services = HostServices {
        notifications: Arc::new(FanOutNotificationSink::new(sinks)),
        ..fixture.harness.services()
    };
    let orchestrator = ProvisioningOrchestrator::new(services, ProvisioningConfig::default());

    let report = orchestrator
        .deactivate_scanner(&scanner_parameters(Uuid::new_v4(), SCAN_NAME, &[]))
        .await;

    assert_eq!(report.disposition, StepDisposition::EntityMissing);
    let received = tokio_test::assert_ok!(receiver.try_recv());
    assert_eq!(received.code(), Some(codes::SCAN_INSTANCE_NOT_FOUND));
    assert_eq!(fixture.harness.incidents.incidents().len(), 1);
}
