#![allow(clippy::unwrap_used)]
#![allow(clippy::arithmetic_side_effects)]

use super::*;
use crate::driver::DriverConnection;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
struct Calls {
    opened: Vec<String>,
    switched: Vec<String>,
    closed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Behavior {
    Succeed,
    RefuseConnect,
    NeverConnect,
    RejectSwitch,
    FailClose,
}

#[derive(Debug)]
struct FakeDriver {
    calls: Arc<Mutex<Calls>>,
    behavior: Behavior,
}

impl FakeDriver {
    fn new(behavior: Behavior) -> (Self, Arc<Mutex<Calls>>) {
        let calls = Arc::new(Mutex::new(Calls::default()));
        (
            Self {
                calls: Arc::clone(&calls),
                behavior,
            },
            calls,
        )
    }
}

#[async_trait]
impl Driver for FakeDriver {
    type Connection = FakeConnection;

    async fn open(&self, connection_string: &str) -> Result<FakeConnection> {
        match self.behavior {
            Behavior::RefuseConnect => {
                return Err(ConnectorError::connection_failed(
                    "Failed to open connection",
                    std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
                ));
            }
            Behavior::NeverConnect => std::future::pending::<()>().await,
            _ => {}
        }

        self.calls
            .lock()
            .unwrap()
            .opened
            .push(connection_string.to_string());
        Ok(FakeConnection {
            state: ConnectionState::Open,
            calls: Arc::clone(&self.calls),
            behavior: self.behavior,
        })
    }
}

#[derive(Debug)]
struct FakeConnection {
    state: ConnectionState,
    calls: Arc<Mutex<Calls>>,
    behavior: Behavior,
}

#[async_trait]
impl DriverConnection for FakeConnection {
    fn state(&self) -> ConnectionState {
        self.state
    }

    async fn change_database(&mut self, database: &str) -> Result<()> {
        if self.behavior == Behavior::RejectSwitch {
            return Err(ConnectorError::connection_failed(
                "Failed to switch database",
                std::io::Error::other(format!("database '{database}' does not exist")),
            ));
        }
        self.calls.lock().unwrap().switched.push(database.to_string());
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.state = ConnectionState::Closed;
        self.calls.lock().unwrap().closed += 1;
        if self.behavior == Behavior::FailClose {
            return Err(ConnectorError::connection_failed(
                "Failed to close connection",
                std::io::Error::from(std::io::ErrorKind::BrokenPipe),
            ));
        }
        Ok(())
    }
}

fn connector(behavior: Behavior) -> (Connector<FakeDriver>, Arc<Mutex<Calls>>) {
    let (driver, calls) = FakeDriver::new(behavior);
    let settings = ConnectionSettings::integrated("db1", "orders").with_connect_timeout(30);
    (Connector::new(settings, driver).unwrap(), calls)
}

#[tokio::test]
async fn test_construction_does_not_connect() {
    let (connector, calls) = connector(Behavior::Succeed);

    assert_eq!(connector.server(), "db1");
    assert_eq!(connector.catalog(), "orders");
    assert_eq!(connector.connection_state(), None);
    assert!(calls.lock().unwrap().opened.is_empty());
}

#[tokio::test]
async fn test_acquire_opens_lazily_and_reuses() {
    let (mut connector, calls) = connector(Behavior::Succeed);

    let state = connector.acquire_connection().await.unwrap().state();
    assert_eq!(state, ConnectionState::Open);
    connector.acquire_connection().await.unwrap();

    let calls = calls.lock().unwrap();
    assert_eq!(calls.opened.len(), 1);
    assert_eq!(
        calls.opened[0],
        "Data Source=db1;Initial Catalog=orders;Integrated Security=True;Connect Timeout=30"
    );
}

#[tokio::test]
async fn test_acquire_replaces_closed_connection() {
    let (mut connector, calls) = connector(Behavior::Succeed);

    connector.acquire_connection().await.unwrap();
    connector.close_connection().await;
    assert_eq!(connector.connection_state(), Some(ConnectionState::Closed));

    let state = connector.acquire_connection().await.unwrap().state();
    assert_eq!(state, ConnectionState::Open);
    assert_eq!(calls.lock().unwrap().opened.len(), 2);
}

#[tokio::test]
async fn test_acquire_replaces_broken_connection() {
    let (mut connector, calls) = connector(Behavior::Succeed);

    connector.acquire_connection().await.unwrap().state = ConnectionState::Broken;
    assert_eq!(connector.connection_state(), Some(ConnectionState::Broken));

    connector.acquire_connection().await.unwrap();
    assert_eq!(connector.connection_state(), Some(ConnectionState::Open));
    assert_eq!(calls.lock().unwrap().opened.len(), 2);
}

#[tokio::test]
async fn test_acquire_propagates_driver_error() {
    let (mut connector, _) = connector(Behavior::RefuseConnect);

    let error = connector.acquire_connection().await.unwrap_err();
    assert!(matches!(error, ConnectorError::Connection { .. }));
    assert_eq!(connector.connection_state(), None);
}

#[tokio::test(start_paused = true)]
async fn test_acquire_times_out() {
    let (mut connector, _) = connector(Behavior::NeverConnect);

    let error = connector.acquire_connection().await.unwrap_err();
    assert!(matches!(
        error,
        ConnectorError::ConnectionTimeout(timeout) if timeout == Duration::from_secs(30)
    ));
    assert_eq!(connector.connection_state(), None);
}

#[tokio::test]
async fn test_zero_timeout_connects_without_deadline() {
    let (driver, calls) = FakeDriver::new(Behavior::Succeed);
    let settings = ConnectionSettings::integrated("db1", "orders").with_connect_timeout(0);
    let mut connector = Connector::new(settings, driver).unwrap();

    connector.acquire_connection().await.unwrap();
    assert!(calls.lock().unwrap().opened[0].ends_with("Connect Timeout=0"));
}

#[tokio::test]
async fn test_close_without_connection_is_noop() {
    let (mut connector, calls) = connector(Behavior::Succeed);

    connector.close_connection().await;
    assert_eq!(calls.lock().unwrap().closed, 0);

    connector.acquire_connection().await.unwrap();
    connector.close_connection().await;
    connector.close_connection().await;
    assert_eq!(calls.lock().unwrap().closed, 1);
}

#[tokio::test]
async fn test_close_failure_is_swallowed() {
    let (mut connector, calls) = connector(Behavior::FailClose);

    connector.acquire_connection().await.unwrap();
    connector.close_connection().await;

    assert_eq!(connector.connection_state(), Some(ConnectionState::Closed));
    assert_eq!(calls.lock().unwrap().closed, 1);
}

#[tokio::test]
async fn test_switch_before_connect_changes_next_open() {
    let (mut connector, calls) = connector(Behavior::Succeed);

    connector.switch_database("billing").await.unwrap();
    assert_eq!(connector.catalog(), "billing");
    assert!(calls.lock().unwrap().switched.is_empty());

    connector.acquire_connection().await.unwrap();
    let calls = calls.lock().unwrap();
    assert!(calls.opened[0].contains("Initial Catalog=billing"));
    assert!(!calls.opened[0].contains("orders"));
}

#[tokio::test]
async fn test_switch_on_open_connection() {
    let (mut connector, calls) = connector(Behavior::Succeed);

    connector.acquire_connection().await.unwrap();
    connector.switch_database("X").await.unwrap();

    assert_eq!(calls.lock().unwrap().switched, vec!["X".to_string()]);
    assert_eq!(
        connector.connection_info(ConnectionInfoFlags::INITIAL_CATALOG),
        "Initial catalog: X"
    );
}

#[tokio::test]
async fn test_reconnect_after_switch_uses_new_catalog() {
    let (mut connector, calls) = connector(Behavior::Succeed);

    connector.acquire_connection().await.unwrap();
    connector.switch_database("billing").await.unwrap();
    connector.acquire_connection().await.unwrap().state = ConnectionState::Broken;
    connector.acquire_connection().await.unwrap();

    let calls = calls.lock().unwrap();
    assert_eq!(calls.opened.len(), 2);
    assert!(calls.opened[1].contains("Initial Catalog=billing"));
}

#[tokio::test]
async fn test_switch_after_close_skips_driver() {
    let (mut connector, calls) = connector(Behavior::Succeed);

    connector.acquire_connection().await.unwrap();
    connector.close_connection().await;
    connector.switch_database("billing").await.unwrap();

    assert!(calls.lock().unwrap().switched.is_empty());
    assert_eq!(connector.catalog(), "billing");
}

#[tokio::test]
async fn test_switch_rejects_empty_name() {
    let (mut connector, _) = connector(Behavior::Succeed);

    let error = connector.switch_database("").await.unwrap_err();
    assert!(matches!(
        error,
        ConnectorError::InvalidArgument {
            parameter: "database",
            ..
        }
    ));
    assert_eq!(connector.catalog(), "orders");
}

#[tokio::test]
async fn test_switch_rejected_by_server_keeps_catalog() {
    let (mut connector, _) = connector(Behavior::RejectSwitch);

    connector.acquire_connection().await.unwrap();
    let error = connector.switch_database("missing").await.unwrap_err();

    assert!(matches!(error, ConnectorError::Connection { .. }));
    assert_eq!(connector.catalog(), "orders");
}

const TRICKY_PASSWORD: &str = "=p;w'd\"x";

fn tricky_connector(behavior: Behavior) -> (Connector<FakeDriver>, Arc<Mutex<Calls>>) {
    let (driver, calls) = FakeDriver::new(behavior);
    let settings =
        ConnectionSettings::with_credentials("db1", "sales = 2024", "app", TRICKY_PASSWORD);
    (Connector::new(settings, driver).unwrap(), calls)
}

#[tokio::test]
async fn test_switch_and_reconnect_keep_quoted_values_intact() {
    let (mut connector, calls) = tricky_connector(Behavior::Succeed);

    connector.acquire_connection().await.unwrap();
    connector.switch_database("billing; eu=1").await.unwrap();
    connector.acquire_connection().await.unwrap().state = ConnectionState::Broken;
    connector.acquire_connection().await.unwrap();

    let calls = calls.lock().unwrap();
    assert_eq!(calls.switched, vec!["billing; eu=1".to_string()]);
    assert_eq!(calls.opened.len(), 2);

    let first = ConnectionString::parse(&calls.opened[0]).unwrap();
    assert_eq!(first.get("Password"), Some(TRICKY_PASSWORD));
    assert_eq!(first.get("Initial Catalog"), Some("sales = 2024"));

    let reopened = ConnectionString::parse(&calls.opened[1]).unwrap();
    assert_eq!(reopened.get("Password"), Some(TRICKY_PASSWORD));
    assert_eq!(reopened.get("Initial Catalog"), Some("billing; eu=1"));
    assert_eq!(reopened.get("User ID"), Some("app"));

    let stored = connector.connection_string().reveal().unwrap();
    let stored = ConnectionString::parse(&stored).unwrap();
    assert_eq!(stored.get("Password"), Some(TRICKY_PASSWORD));
    assert_eq!(connector.catalog(), "billing; eu=1");
}

#[tokio::test]
async fn test_rejected_switch_keeps_stored_string_and_hides_password() {
    let (mut connector, calls) = tricky_connector(Behavior::RejectSwitch);

    connector.acquire_connection().await.unwrap();
    let before = connector.connection_string().reveal().unwrap();
    let error = connector.switch_database("billing").await.unwrap_err();

    assert!(matches!(error, ConnectorError::Connection { .. }));
    assert!(!error.to_string().contains(TRICKY_PASSWORD));
    assert!(!format!("{error:?}").contains(TRICKY_PASSWORD));
    assert_eq!(connector.catalog(), "sales = 2024");
    assert_eq!(*connector.connection_string().reveal().unwrap(), *before);

    // The next connection still targets the original catalog
    connector.acquire_connection().await.unwrap().state = ConnectionState::Broken;
    connector.acquire_connection().await.unwrap();
    let reopened = ConnectionString::parse(&calls.lock().unwrap().opened[1]).unwrap();
    assert_eq!(reopened.get("Initial Catalog"), Some("sales = 2024"));
}

#[tokio::test]
async fn test_connection_info_reports_settings() {
    let (connector, _) = connector(Behavior::Succeed);

    let info = connector.connection_info(
        ConnectionInfoFlags::DATA_SOURCE | ConnectionInfoFlags::CONNECTION_TIMEOUT,
    );
    assert_eq!(info, "Data source: db1; 30s");
    assert_eq!(connector.connection_info(ConnectionInfoFlags::empty()), "");
}

#[tokio::test]
async fn test_dispose_is_idempotent() {
    let (mut connector, calls) = connector(Behavior::Succeed);

    connector.acquire_connection().await.unwrap();
    connector.dispose().await;
    connector.dispose().await;

    assert!(connector.is_disposed());
    assert!(connector.connection_string().is_cleared());
    assert_eq!(connector.connection_state(), None);
    assert_eq!(calls.lock().unwrap().closed, 1);
}

#[tokio::test]
async fn test_dispose_without_connection() {
    let (mut connector, calls) = connector(Behavior::Succeed);

    connector.dispose().await;
    assert!(connector.is_disposed());
    assert_eq!(calls.lock().unwrap().closed, 0);
}

#[tokio::test]
async fn test_operations_after_dispose_fail() {
    let (mut connector, calls) = connector(Behavior::Succeed);
    connector.dispose().await;

    assert!(matches!(
        connector.acquire_connection().await.unwrap_err(),
        ConnectorError::Disposed
    ));
    assert!(matches!(
        connector.switch_database("billing").await.unwrap_err(),
        ConnectorError::Disposed
    ));
    assert!(calls.lock().unwrap().opened.is_empty());

    // Reporting still works from the cached details
    assert_eq!(
        connector.connection_info(ConnectionInfoFlags::DATA_SOURCE),
        "Data source: db1"
    );
}

#[tokio::test]
async fn test_credentials_reach_driver_but_not_debug() {
    let (driver, calls) = FakeDriver::new(Behavior::Succeed);
    let settings = ConnectionSettings::with_credentials("db1", "orders", "app", "s3cret");
    let mut connector = Connector::new(settings, driver).unwrap();

    connector.acquire_connection().await.unwrap();
    assert!(calls.lock().unwrap().opened[0].contains("Password=s3cret"));

    let debug = format!("{connector:?}");
    assert!(!debug.contains("s3cret"));
    assert_eq!(
        connector.connection_info(ConnectionInfoFlags::USER | ConnectionInfoFlags::INTEGRATED_SECURITY),
        "User: app; Integrated security: false"
    );
}

#[tokio::test]
async fn test_from_connection_string() {
    let (driver, calls) = FakeDriver::new(Behavior::Succeed);
    let secret = ProtectedSecret::new("Server=db2;Database=billing;uid=app;pwd=x;Timeout=5");
    let mut connector = Connector::from_connection_string(secret, driver).unwrap();

    assert_eq!(connector.server(), "db2");
    assert_eq!(connector.catalog(), "billing");
    assert_eq!(connector.details().connect_timeout_secs, 5);

    connector.switch_database("archive").await.unwrap();
    connector.acquire_connection().await.unwrap();
    assert_eq!(
        calls.lock().unwrap().opened[0],
        "Server=db2;Database=archive;uid=app;pwd=x;Timeout=5"
    );
}

#[test]
fn test_from_connection_string_rejects_garbage() {
    let (driver, _) = FakeDriver::new(Behavior::Succeed);
    let secret = ProtectedSecret::new("Server=db2;Database");

    let error = Connector::from_connection_string(secret, driver).unwrap_err();
    assert!(matches!(error, ConnectorError::Configuration { .. }));
}

#[test]
fn test_cleared_password_rejected_at_construction() {
    let (driver, _) = FakeDriver::new(Behavior::Succeed);
    let mut password = ProtectedSecret::new("s3cret");
    password.clear();
    let settings = ConnectionSettings::with_credentials("db1", "orders", "app", password);

    let error = Connector::new(settings, driver).unwrap_err();
    assert!(error.is_invalid_argument());
}
