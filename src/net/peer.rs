//! Peer driver: relay connection plus the fixed-rate tick loop

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::protocol::{parse_line, Command, ProtocolError};
use crate::game::autopilot::InputSource;
use crate::game::{MatchCoordinator, MatchPhase};
use crate::util::time::{tick_duration, Timer};

/// What the receive task hands to the tick loop
#[derive(Debug, PartialEq)]
pub enum Inbound {
    Command(Command),
    /// EOF or read error on the relay socket
    Disconnected,
}

/// Parse relay lines into `tx` until EOF or a read error.
///
/// A bad line is logged and dropped; it never ends the loop.
pub async fn read_loop<R>(reader: R, tx: mpsc::UnboundedSender<Inbound>)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match parse_line(&line) {
                Ok(cmd) => {
                    if tx.send(Inbound::Command(cmd)).is_err() {
                        return;
                    }
                }
                Err(ProtocolError::Empty) => {}
                Err(ProtocolError::Unknown(name)) => {
                    debug!(command = %name, "Ignoring unknown command");
                }
                Err(e) => {
                    warn!(error = %e, line = %line, "Failed to parse relay line");
                }
            },
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Relay read failed");
                break;
            }
        }
    }
    let _ = tx.send(Inbound::Disconnected);
}

/// One headless participant
pub struct Peer<I> {
    coordinator: MatchCoordinator,
    input: I,
    fps: u32,
}

impl<I: InputSource> Peer<I> {
    pub fn new(coordinator: MatchCoordinator, input: I, fps: u32) -> Self {
        Self {
            coordinator,
            input,
            fps,
        }
    }

    pub fn coordinator(&self) -> &MatchCoordinator {
        &self.coordinator
    }

    /// Connect to the relay and tick until the connection closes
    pub async fn run(mut self, relay_addr: &str) -> anyhow::Result<()> {
        let stream = TcpStream::connect(relay_addr).await?;
        info!(relay = %relay_addr, "Connected to relay");
        let (read_half, mut write_half) = stream.into_split();

        let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(read_loop(BufReader::new(read_half), inbound_tx));

        // Writer task: encoded lines -> socket
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let writer = tokio::spawn(async move {
            while let Some(mut line) = outbound_rx.recv().await {
                line.push('\n');
                if let Err(e) = write_half.write_all(line.as_bytes()).await {
                    debug!(error = %e, "Relay write failed");
                    break;
                }
            }
        });

        let budget_ms = tick_duration(self.fps).as_millis() as u64;
        let mut tick_interval = interval(tick_duration(self.fps));
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_phase = self.coordinator.phase();

        loop {
            tick_interval.tick().await;
            let timer = Timer::new();

            if self.process_inbound(&mut inbound_rx) {
                self.coordinator.on_disconnect();
                break;
            }

            let input = self.input.sample(&self.coordinator);
            self.coordinator.tick(&input);

            if !self.flush_outbound(&outbound_tx) {
                warn!("Writer task gone, stopping");
                break;
            }

            let phase = self.coordinator.phase();
            if phase != last_phase {
                let (mine, theirs) = self.coordinator.score();
                info!(?phase, my_wins = mine, enemy_wins = theirs, "Phase changed");
                if phase == MatchPhase::GameOver {
                    info!(outcome = ?self.coordinator.outcome(), "Match finished");
                }
                last_phase = phase;
            }

            let elapsed = timer.elapsed_ms();
            if elapsed > budget_ms {
                debug!(elapsed_ms = elapsed, budget_ms, "Slow tick");
            }
        }

        reader.abort();
        writer.abort();
        Ok(())
    }

    /// Hand queued commands to the writer task; false once it is gone
    fn flush_outbound(&mut self, tx: &mpsc::UnboundedSender<String>) -> bool {
        for cmd in self.coordinator.drain_outbound() {
            if tx.send(cmd.to_string()).is_err() {
                return false;
            }
        }
        true
    }

    /// Apply queued commands; true once the relay connection is gone
    fn process_inbound(&mut self, rx: &mut mpsc::UnboundedReceiver<Inbound>) -> bool {
        while let Ok(msg) = rx.try_recv() {
            match msg {
                Inbound::Command(cmd) => self.coordinator.handle(cmd),
                Inbound::Disconnected => return true,
            }
        }
        false
    }
}
