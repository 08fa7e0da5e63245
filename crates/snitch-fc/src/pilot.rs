use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Deserialize;
use snitch_proto::command::OperatorCommand;
use snitch_proto::telemetry::{FcHealth, StatusReport};
use snitch_proto::threat::{Threat, ZONE_COUNT};
use tracing::{debug, info};

use crate::msp::RcCommand;
use crate::safety::{CadenceGate, LinkEvent};

pub const CHANNEL_MIN: u16 = 1000;
pub const CHANNEL_MAX: u16 = 2000;
/// Throttle floor, also the only throttle ever sent while disarmed.
pub const THROTTLE_OFF: u16 = 1000;
pub const YAW_DEFAULT: u16 = 1500;
pub const PITCH_DEFAULT: u16 = 1500;
pub const ROLL_DEFAULT: u16 = 1500;
/// Arm switch (aux 1) positions.
pub const ARM_VALUE: u16 = 2000;
pub const DISARM_VALUE: u16 = 1000;
/// Minimum spacing between two RC requests.
pub const EMIT_INTERVAL: Duration = Duration::from_millis(20);

pub fn clamp_channel(v: i32) -> u16 {
    v.clamp(i32::from(CHANNEL_MIN), i32::from(CHANNEL_MAX)) as u16
}

/// Who may write the throttle channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThrottleAuthority {
    /// Vision may write throttle: an inactive verdict drops it back to the floor
    /// and zone responses may set it. Operator input is overwritten on the next scan.
    #[default]
    Vision,
    /// Only the operator writes throttle; vision steers attitude channels only.
    Operator,
}

/// Setpoint overrides applied when a threat sits in a given zone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ZoneResponse {
    pub throttle: Option<u16>,
    pub yaw: Option<u16>,
    pub pitch: Option<u16>,
    pub roll: Option<u16>,
}

/// Config form: `[[fc.zone_response]] zone = 1, pitch = 1200`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ZoneResponseCfg {
    pub zone: u8,
    #[serde(flatten)]
    pub response: ZoneResponse,
}

/// Threat zone -> attitude lookup. Zones without an entry leave setpoints untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneTable([Option<ZoneResponse>; ZONE_COUNT]);

impl ZoneTable {
    pub fn empty() -> Self {
        Self([None; ZONE_COUNT])
    }

    pub fn from_entries(entries: &[ZoneResponseCfg]) -> anyhow::Result<Self> {
        let mut table = Self::empty();
        for e in entries {
            anyhow::ensure!((e.zone as usize) < ZONE_COUNT, "zone_response.zone {} out of range 0..=8", e.zone);
            for v in [e.response.throttle, e.response.yaw, e.response.pitch, e.response.roll]
                .into_iter()
                .flatten()
            {
                anyhow::ensure!(
                    (CHANNEL_MIN..=CHANNEL_MAX).contains(&v),
                    "zone_response value {} for zone {} outside {}..={}",
                    v, e.zone, CHANNEL_MIN, CHANNEL_MAX
                );
            }
            table.0[e.zone as usize] = Some(e.response);
        }
        Ok(table)
    }

    pub fn get(&self, zone: u8) -> Option<&ZoneResponse> {
        self.0.get(zone as usize).and_then(Option::as_ref)
    }
}

/// Only the top-middle cell reacts: pitch forward to 1200. The other eight
/// zones are deliberately empty until a full table is configured.
impl Default for ZoneTable {
    fn default() -> Self {
        let mut table = Self::empty();
        table.0[1] = Some(ZoneResponse { pitch: Some(1200), ..ZoneResponse::default() });
        table
    }
}

/// The commanded setpoints. One instance per process, owned by [`Pilot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlightState {
    pub armed: bool,
    pub throttle: u16,
    pub yaw: u16,
    pub pitch: u16,
    pub roll: u16,
    pub vision_enabled: bool,
    pub last_emit: Option<Instant>,
}

impl Default for FlightState {
    fn default() -> Self {
        Self {
            armed: false,
            throttle: THROTTLE_OFF,
            yaw: YAW_DEFAULT,
            pitch: PITCH_DEFAULT,
            roll: ROLL_DEFAULT,
            vision_enabled: false,
            last_emit: None,
        }
    }
}

/// Flight command state machine: operator intent and threat verdicts in,
/// rate-limited RC requests out.
#[derive(Debug, Clone)]
pub struct Pilot {
    state: FlightState,
    zones: ZoneTable,
    authority: ThrottleAuthority,
    gate: CadenceGate,
    last_threat: Option<Threat>,
}

impl Default for Pilot {
    fn default() -> Self {
        Self::new(ZoneTable::default(), ThrottleAuthority::default(), EMIT_INTERVAL)
    }
}

impl Pilot {
    pub fn new(zones: ZoneTable, authority: ThrottleAuthority, emit_interval: Duration) -> Self {
        Self {
            state: FlightState::default(),
            zones,
            authority,
            gate: CadenceGate::new(emit_interval),
            last_threat: None,
        }
    }

    pub fn state(&self) -> FlightState {
        FlightState { last_emit: self.gate.last(), ..self.state }
    }

    pub fn last_threat(&self) -> Option<Threat> {
        self.last_threat
    }

    pub fn arm(&mut self) {
        self.state.armed = true;
    }

    pub fn disarm(&mut self) {
        self.state.armed = false;
        self.state.throttle = THROTTLE_OFF;
    }

    /// Stored regardless of arm state; disarmed emission ignores it.
    pub fn set_throttle(&mut self, value: i32) {
        self.state.throttle = clamp_channel(value);
    }

    pub fn set_vision(&mut self, enabled: bool) {
        self.state.vision_enabled = enabled;
    }

    pub fn toggle_vision(&mut self) {
        self.state.vision_enabled = !self.state.vision_enabled;
    }

    pub fn apply_threat(&mut self, threat: &Threat) {
        self.last_threat = Some(*threat);
        if !self.state.vision_enabled {
            return;
        }

        if !threat.active {
            if self.authority == ThrottleAuthority::Vision {
                self.state.throttle = THROTTLE_OFF;
            }
            self.state.yaw = YAW_DEFAULT;
            self.state.pitch = PITCH_DEFAULT;
            self.state.roll = ROLL_DEFAULT;
            return;
        }

        let Some(resp) = threat.zone.and_then(|z| self.zones.get(z)).copied() else {
            return;
        };
        if self.authority == ThrottleAuthority::Vision {
            if let Some(t) = resp.throttle {
                self.state.throttle = t;
            }
        }
        if let Some(v) = resp.yaw { self.state.yaw = v; }
        if let Some(v) = resp.pitch { self.state.pitch = v; }
        if let Some(v) = resp.roll { self.state.roll = v; }
    }

    /// Cadence gate: `None` if the previous request went out less than one
    /// interval ago. Otherwise the request to send now; a disarmed pilot always
    /// yields floor throttle, neutral attitude and the disarm switch position.
    pub fn tick(&mut self, now: Instant) -> Option<RcCommand> {
        if !self.gate.admit(now) {
            return None;
        }
        let s = &self.state;
        Some(if s.armed {
            RcCommand { roll: s.roll, pitch: s.pitch, throttle: s.throttle, yaw: s.yaw, aux1: ARM_VALUE }
        } else {
            RcCommand {
                roll: ROLL_DEFAULT,
                pitch: PITCH_DEFAULT,
                throttle: THROTTLE_OFF,
                yaw: YAW_DEFAULT,
                aux1: DISARM_VALUE,
            }
        })
    }
}

/// Cloneable handle to the process-wide [`Pilot`].
///
/// Each method takes the lock for exactly one operation. Callers never get a
/// guard, so nothing can hold the lock across camera or serial I/O.
#[derive(Debug, Clone, Default)]
pub struct SharedPilot(Arc<Mutex<Pilot>>);

impl SharedPilot {
    pub fn new(pilot: Pilot) -> Self {
        Self(Arc::new(Mutex::new(pilot)))
    }

    // A panic elsewhere must not lock us out of disarming.
    fn lock(&self) -> MutexGuard<'_, Pilot> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn arm(&self) {
        self.lock().arm();
        info!("pilot: armed");
    }

    pub fn disarm(&self) {
        self.lock().disarm();
    }

    pub fn set_throttle(&self, value: i32) {
        self.lock().set_throttle(value);
    }

    pub fn toggle_vision(&self) -> bool {
        let mut p = self.lock();
        p.toggle_vision();
        p.state.vision_enabled
    }

    pub fn apply_threat(&self, threat: Threat) {
        self.lock().apply_threat(&threat);
    }

    /// One control iteration under a single lock: a link event that forces
    /// disarm lands before the frame is built, so no armed frame can slip out
    /// between the two.
    pub fn tick_with_link(&self, now: Instant, link: LinkEvent) -> Option<RcCommand> {
        let mut p = self.lock();
        if link.forces_disarm() {
            p.disarm();
        }
        p.tick(now)
    }

    /// Consistent copy of every setpoint plus the armed flag.
    pub fn snapshot(&self) -> FlightState {
        self.lock().state()
    }

    /// Applies an operator command. `Status` changes nothing.
    pub fn apply_command(&self, cmd: OperatorCommand) {
        match cmd {
            OperatorCommand::Arm => self.arm(),
            OperatorCommand::Disarm => {
                self.disarm();
                info!("pilot: disarmed by operator");
            }
            OperatorCommand::SetThrottle { value } => {
                self.set_throttle(value);
                debug!("pilot: throttle <- {}", value);
            }
            OperatorCommand::ToggleVision => {
                let on = self.toggle_vision();
                info!("pilot: vision {}", if on { "on" } else { "off" });
            }
            OperatorCommand::Status => {}
        }
    }

    pub fn report(&self, link_clients: usize, fc: FcHealth) -> StatusReport {
        let (s, last_threat) = {
            let p = self.lock();
            (p.state(), p.last_threat())
        };
        StatusReport {
            ts_unix_ms: (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64,
            armed: s.armed,
            throttle: s.throttle,
            yaw: s.yaw,
            pitch: s.pitch,
            roll: s.roll,
            vision_enabled: s.vision_enabled,
            link_clients,
            last_threat,
            fc,
        }
    }
}
