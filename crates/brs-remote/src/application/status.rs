//! Combined health report for the three simulator services.

use std::fmt;

use async_trait::async_trait;
use brs_core::SimulatorConfig;
use serde::Serialize;

/// A service that can report whether it is reachable.
///
/// Implementations never fail; any error counts as "down".
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check_health(&self) -> bool;
}

/// The simulator services, each enabled by its own simulator flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    Ecp,
    Installer,
    Console,
}

impl Service {
    pub fn label(self) -> &'static str {
        match self {
            Self::Ecp => "ECP",
            Self::Installer => "Web Installer",
            Self::Console => "Debug Console",
        }
    }

    /// The simulator command-line flag that enables this service.
    pub fn simulator_flag(self) -> &'static str {
        match self {
            Self::Ecp => "--ecp",
            Self::Installer => "--web",
            Self::Console => "--console",
        }
    }

    /// What to tell the user when the service cannot be reached.
    pub fn hint(self) -> String {
        format!(
            "Make sure brs-desktop is running with the {} flag",
            self.simulator_flag()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceStatus {
    pub service: Service,
    pub port: u16,
    pub up: bool,
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (port {}): ", self.service.label(), self.port)?;
        if self.up {
            write!(f, "UP")
        } else {
            write!(f, "DOWN - {}", self.service.hint())
        }
    }
}

/// Result of probing all three services once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulatorStatus {
    pub host: String,
    pub ecp: ServiceStatus,
    pub installer: ServiceStatus,
    pub console: ServiceStatus,
}

impl SimulatorStatus {
    pub fn services(&self) -> [&ServiceStatus; 3] {
        [&self.ecp, &self.installer, &self.console]
    }

    pub fn all_up(&self) -> bool {
        self.services().iter().all(|s| s.up)
    }
}

impl fmt::Display for SimulatorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [ecp, installer, console] = self.services();
        write!(f, "{ecp}\n{installer}\n{console}")
    }
}

/// Probes the three services concurrently.
pub async fn check_simulator(
    config: &SimulatorConfig,
    ecp: &dyn HealthProbe,
    installer: &dyn HealthProbe,
    console: &dyn HealthProbe,
) -> SimulatorStatus {
    let (ecp_up, installer_up, console_up) = tokio::join!(
        ecp.check_health(),
        installer.check_health(),
        console.check_health()
    );

    SimulatorStatus {
        host: config.host.clone(),
        ecp: ServiceStatus {
            service: Service::Ecp,
            port: config.ecp_port,
            up: ecp_up,
        },
        installer: ServiceStatus {
            service: Service::Installer,
            port: config.installer_port(),
            up: installer_up,
        },
        console: ServiceStatus {
            service: Service::Console,
            port: config.console_port,
            up: console_up,
        },
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
