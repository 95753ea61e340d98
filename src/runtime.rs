// Session runner: open the servo bus, build the rig, run the requested job
// and publish status over Zenoh.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::actuator::{Actuator, FeetechBus, FeetechServo, ServoTuning, SharedBus, Stop};
use crate::calibration::{move_to_center, release, Calibrator};
use crate::config::{RigConfig, TOPIC_HEALTH, TOPIC_TRAVEL};
use crate::error::RigError;
use crate::messages::{RigHealth, TravelReport};
use crate::rig::Rig;
use crate::status::{self, LogSink, StatusSink};

/// What the session should do once the rig is up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    /// Full calibration pass, then center the disc
    Calibrate,
    /// Reel every string out for the given time
    Release(Duration),
    /// Log angle and travel state of every motor
    Status,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub config: Option<PathBuf>,
    pub port: Option<String>,
    pub publish: bool,
    pub job: Job,
}

/// Logs every report and also publishes it as JSON
pub struct ZenohSink {
    session: zenoh::Session,
}

impl ZenohSink {
    pub async fn open() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        info!("Opening Zenoh session...");
        let session = zenoh::open(zenoh::Config::default()).await?;
        info!("Publishing to: {}, {}", TOPIC_TRAVEL, TOPIC_HEALTH);
        Ok(Self { session })
    }

    async fn put(&self, topic: &str, json: String) -> Result<(), RigError> {
        self.session
            .put(topic, json)
            .await
            .map_err(|e| RigError::Publish(e.to_string()))
    }
}

#[async_trait]
impl StatusSink for ZenohSink {
    async fn travel(&self, report: &TravelReport) -> Result<(), RigError> {
        LogSink.travel(report).await?;
        let json = serde_json::to_string(report).map_err(|e| RigError::Publish(e.to_string()))?;
        self.put(TOPIC_TRAVEL, json).await
    }

    async fn health(&self, health: RigHealth) -> Result<(), RigError> {
        LogSink.health(health).await?;
        let json = serde_json::to_string(&health).map_err(|e| RigError::Publish(e.to_string()))?;
        self.put(TOPIC_HEALTH, json).await
    }
}

/// Connect one Feetech servo per configured corner
fn build_rig(config: &RigConfig, bus: SharedBus) -> Result<Rig, Box<dyn std::error::Error + Send + Sync>> {
    let mut actuators = Vec::with_capacity(config.motors.len());
    for motor in &config.motors {
        let servo = FeetechServo::connect(Arc::clone(&bus), motor.id, ServoTuning::default())?;
        info!("{} {}: servo {} ({:?} winding)", motor.corner.arrow(), motor.corner, servo.id(), motor.winding);
        let actuator: Arc<dyn Actuator> = Arc::new(servo);
        actuators.push((motor.corner, motor.winding, actuator));
    }
    Ok(Rig::new(actuators)?)
}

async fn stop_all(rig: &Rig, then: Stop) {
    for handle in rig.handles() {
        if let Err(e) = handle.stop(then).await {
            warn!("Failed to stop {}: {}", handle.corner(), e);
        }
    }
}

/// Calibrate, then center the disc. On failure every motor coasts.
pub async fn calibrate(rig: &mut Rig, config: &RigConfig, sink: &dyn StatusSink) -> Result<(), RigError> {
    sink.health(RigHealth::Idle).await?;

    let result = Calibrator::new(rig, config, sink).run().await;
    let centers = match result {
        Ok(centers) => centers,
        Err(e) => {
            stop_all(rig, Stop::Coast).await;
            return Err(e);
        }
    };
    info!("Calibrated centers [TL, TR, BR, BL] {:?}", centers);

    if let Err(e) = move_to_center(rig, config).await {
        sink.health(RigHealth::Fault).await?;
        stop_all(rig, Stop::Coast).await;
        return Err(e);
    }
    status::report(rig, sink, "Centered").await
}

pub async fn run(options: RunOptions) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut config = RigConfig::load(options.config.as_deref())?;
    if let Some(port) = options.port {
        config.port = port;
    }

    info!("Opening servo bus on {}", config.port);
    let bus: SharedBus = Arc::new(Mutex::new(FeetechBus::open(&config.port)?));
    let mut rig = build_rig(&config, bus)?;

    let sink: Box<dyn StatusSink> = if options.publish {
        Box::new(ZenohSink::open().await?)
    } else {
        Box::new(LogSink)
    };

    info!(
        "Rig ready: calibration {} deg/s (ceiling {}), operating {} deg/s (ceiling {})",
        config.calibration_speed,
        config.calibration_speed_ceiling,
        config.operating_speed,
        config.operating_speed_ceiling
    );

    match options.job {
        Job::Calibrate => calibrate(&mut rig, &config, sink.as_ref()).await?,
        Job::Release(time) => release(&rig, &config, time).await?,
        Job::Status => {
            status::report(&rig, sink.as_ref(), "Status").await?;
            for handle in rig.handles() {
                let load = handle.load().await?;
                info!("{} {}: load {:.1}%", handle.corner().arrow(), handle.corner(), load);
            }
        }
    }
    Ok(())
}
