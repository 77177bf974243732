use std::{pin::Pin, time::Duration};

use anyhow::anyhow;
use btleplug::{
    api::{Central, Characteristic, Peripheral as _, WriteType},
    platform::{Adapter, Peripheral},
};
use domino_protocol::{
    Fragments, ManualCommand, PathStep, Status, DEVICE_NAME, DRAW_CONTROL_UUID,
    MANUAL_CONTROL_UUID, POINTS_PER_BLE_WRITE, STATUS_UUID,
};
use futures::{Stream, StreamExt as _};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use uuid::Uuid;

/// Something that accepts paths and manual commands: either the real robot
/// or the simulator.
pub trait DominoLike {
    async fn read_status(&mut self) -> anyhow::Result<Status>;
    async fn send_manual(&mut self, cmd: ManualCommand) -> anyhow::Result<()>;
    async fn send_path(&mut self, steps: &[PathStep]) -> anyhow::Result<()>;
}

pub struct Domino {
    pub adapter: Adapter,
    pub peripheral: Peripheral,
    pub status: Characteristic,
    pub manual: Characteristic,
    pub draw: Characteristic,
}

async fn connect(adapter: &mut Adapter) -> anyhow::Result<Peripheral> {
    let progress = MultiProgress::new();
    let mut bar = progress.add(ProgressBar::new_spinner().with_message("Searching..."));
    bar.enable_steady_tick(crate::TICK);

    let peripheral = find_domino(adapter).await?;
    bar.finish_with_message("found!");
    bar = progress.add(ProgressBar::new_spinner().with_message("Connecting..."));
    bar.enable_steady_tick(crate::TICK);

    peripheral.connect().await?;
    peripheral.discover_services().await?;
    bar.finish_with_message("connected!");

    Ok(peripheral)
}

fn characteristic(peripheral: &Peripheral, uuid: &str, what: &str) -> anyhow::Result<Characteristic> {
    let uuid = Uuid::parse_str(uuid)?;
    peripheral
        .characteristics()
        .into_iter()
        .find(|ch| ch.uuid == uuid)
        .ok_or_else(|| anyhow!("the robot was missing the {what} characteristic"))
}

impl Domino {
    pub async fn new(mut adapter: Adapter) -> anyhow::Result<Self> {
        let peripheral = connect(&mut adapter).await?;

        let status = characteristic(&peripheral, STATUS_UUID, "status")?;
        let manual = characteristic(&peripheral, MANUAL_CONTROL_UUID, "manual control")?;
        let draw = characteristic(&peripheral, DRAW_CONTROL_UUID, "draw control")?;

        Ok(Domino {
            adapter,
            peripheral,
            status,
            manual,
            draw,
        })
    }

    async fn read(&mut self, ch: Characteristic) -> anyhow::Result<Vec<u8>> {
        let mut sleep = Duration::from_millis(10);
        for _ in 0..4 {
            match self.peripheral.read(&ch).await {
                Ok(ret) => {
                    return Ok(ret);
                }
                Err(e) => {
                    tokio::time::sleep(sleep).await;
                    sleep *= 2;
                    log::warn!("connection error: {e}, retrying...");
                    self.peripheral = connect(&mut self.adapter).await?;
                }
            }
        }
        Ok(self.peripheral.read(&ch).await?)
    }

    // Same retry loop as `read`. They're hard to share because the futures
    // returned by `Peripheral::read` and `Peripheral::write` borrow the peripheral.
    async fn write(&mut self, ch: Characteristic, buf: &[u8]) -> anyhow::Result<()> {
        let mut sleep = Duration::from_millis(10);
        for _ in 0..4 {
            match self
                .peripheral
                .write(&ch, buf, WriteType::WithResponse)
                .await
            {
                Ok(ret) => {
                    return Ok(ret);
                }
                Err(e) => {
                    tokio::time::sleep(sleep).await;
                    sleep *= 2;
                    log::warn!("connection error: {e}, retrying...");
                    self.peripheral = connect(&mut self.adapter).await?;
                }
            }
        }
        Ok(self
            .peripheral
            .write(&ch, buf, WriteType::WithResponse)
            .await?)
    }

    /// Subscribes to the periodic status pushes.
    pub async fn status_stream(
        &self,
    ) -> anyhow::Result<Pin<Box<dyn Stream<Item = anyhow::Result<Status>> + Send>>> {
        self.peripheral.subscribe(&self.status).await?;
        let uuid = self.status.uuid;
        let notifications = self.peripheral.notifications().await?;
        Ok(Box::pin(
            notifications
                .filter(move |n| futures::future::ready(n.uuid == uuid))
                .map(|n| Ok(Status::decode(&n.value)?)),
        ))
    }
}

impl DominoLike for Domino {
    async fn read_status(&mut self) -> anyhow::Result<Status> {
        let data = self.read(self.status.clone()).await?;
        Ok(Status::decode(&data)?)
    }

    async fn send_manual(&mut self, cmd: ManualCommand) -> anyhow::Result<()> {
        self.peripheral
            .write(&self.manual, &cmd.encode(), WriteType::WithoutResponse)
            .await?;
        Ok(())
    }

    async fn send_path(&mut self, steps: &[PathStep]) -> anyhow::Result<()> {
        let bar = ProgressBar::new(steps.len() as u64).with_style(
            ProgressStyle::with_template("{msg} {wide_bar} {pos}/{len}")?,
        );
        bar.set_message("Sending path");
        for frag in Fragments::new(steps, POINTS_PER_BLE_WRITE) {
            self.write(self.draw.clone(), &frag.encode()).await?;
            bar.inc(frag.points.len() as u64);
        }
        bar.finish_with_message("sent!");
        Ok(())
    }
}

pub async fn find_domino(adapter: &mut Adapter) -> anyhow::Result<Peripheral> {
    loop {
        let peripherals = adapter.peripherals().await?;
        for p in peripherals {
            if let Some(props) = p.properties().await? {
                if props.local_name.as_deref() == Some(DEVICE_NAME) {
                    return Ok(p);
                }
            }
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}
