mod common;

use chrono::{DateTime, Duration, TimeZone, Utc};

use cloudwatchmon::cli::get::write_report;
use cloudwatchmon::metrics::Dimensions;

use common::{datapoint, RecordingMetricsService};

const INSTANCE: &str = "i-0123456789abcdef0";

async fn render(service: &RecordingMetricsService, recent_hours: u32, now: DateTime<Utc>) -> (String, anyhow::Result<()>) {
    let mut out = Vec::new();
    let result = write_report(service, &mut out, INSTANCE, recent_hours, now).await;
    (String::from_utf8(out).unwrap(), result)
}

fn root_filesystem() -> Dimensions {
    let mut dims = Dimensions::new();
    dims.insert("InstanceId".to_string(), INSTANCE.to_string());
    dims.insert("MountPath".to_string(), "/".to_string());
    dims.insert("Filesystem".to_string(), "/dev/xvda1".to_string());
    dims
}

#[tokio::test]
async fn test_full_report() {
    let mut service = RecordingMetricsService {
        listed: vec![root_filesystem()],
        ..Default::default()
    };
    service.statistics.insert(
        "CPUUtilization".to_string(),
        vec![datapoint(10.0, 5.0, 15.0), datapoint(20.0, 1.0, 30.0)],
    );
    service
        .statistics
        .insert("MemoryUtilization".to_string(), vec![datapoint(42.0, 40.0, 44.5)]);
    service
        .statistics
        .insert("DiskSpaceUtilization".to_string(), vec![datapoint(26.0, 26.0, 26.0)]);

    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let (report, result) = render(&service, 2, now).await;
    result.unwrap();

    assert_eq!(
        report,
        "Instance i-0123456789abcdef0 statistics for the last 2 hours.\n\
         \n\
         CPU Utilization\n\
         \x20   Average: 15.00%, Minimum: 1.00%, Maximum: 30.00%\n\
         \n\
         Memory Utilization\n\
         \x20   Average: 42.00%, Minimum: 40.00%, Maximum: 44.50%\n\
         \n\
         Swap Utilization\n\
         \x20   Average: N/A, Minimum: N/A, Maximum: N/A\n\
         \n\
         Disk Space Utilization\n\
         \x20   Average: 26.00%, Minimum: 26.00%, Maximum: 26.00%\n\
         \n"
    );

    let requests = service.stat_requests.lock().unwrap();
    let namespaces: Vec<&str> = requests.iter().map(|r| r.namespace.as_str()).collect();
    assert_eq!(namespaces, ["AWS/EC2", "System/Linux", "System/Linux", "System/Linux"]);
    assert!(requests.iter().all(|r| r.start == now - Duration::hours(2) && r.period_secs == 300));
    assert_eq!(requests[3].dimensions, root_filesystem());
}

#[tokio::test]
async fn test_disk_section_needs_published_filesystem() {
    let service = RecordingMetricsService::default();
    let now = Utc::now();

    let (report, result) = render(&service, 1, now).await;
    result.unwrap();

    assert!(report.starts_with("Instance i-0123456789abcdef0 statistics for the last 1 hour.\n"));
    assert!(!report.contains("Disk Space Utilization"));
    assert_eq!(service.stat_requests.lock().unwrap().len(), 3);

    let lists = service.list_requests.lock().unwrap();
    assert_eq!(lists.len(), 1);
    let (namespace, metric, filter) = &lists[0];
    assert_eq!(namespace, "System/Linux");
    assert_eq!(metric, "DiskSpaceUtilization");
    assert_eq!(filter.get("MountPath").map(String::as_str), Some("/"));
    assert_eq!(filter.get("InstanceId").map(String::as_str), Some(INSTANCE));
}

#[tokio::test]
async fn test_sections_already_fetched_survive_a_disk_failure() {
    let mut service = RecordingMetricsService {
        fail_list: true,
        ..Default::default()
    };
    service
        .statistics
        .insert("MemoryUtilization".to_string(), vec![datapoint(42.0, 40.0, 44.5)]);

    let (report, result) = render(&service, 3, Utc::now()).await;

    let err = result.unwrap_err();
    assert!(err.to_string().contains("Cannot list DiskSpaceUtilization metrics"));
    assert!(report.starts_with("Instance i-0123456789abcdef0 statistics for the last 3 hours.\n"));
    assert!(report.contains("Memory Utilization\n    Average: 42.00%, Minimum: 40.00%, Maximum: 44.50%\n"));
    assert!(report.ends_with("Swap Utilization\n    Average: N/A, Minimum: N/A, Maximum: N/A\n\n"));
}
