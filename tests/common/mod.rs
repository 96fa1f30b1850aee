//! Shared fixtures for the integration suite.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bulwark_config::GuardConfig;
use bulwark_core::Region;
use bulwark_engine::{Engine, MessageSink};
use bulwark_identity::StaticProfileService;
use bulwark_types::{
    AttributeKey, AttributeValue, BlockVector, Bounds, FlagSetting, PrincipalId, RegionId, State,
};

pub const ALICE: u128 = 0x0000_a11c_e000_4000_8000_0000_0000_0001;
pub const BOB: u128 = 0x0000_0b0b_0000_4000_8000_0000_0000_0002;
pub const CAROL: u128 = 0x0000_ca20_1000_4000_8000_0000_0000_0003;

pub fn alice() -> PrincipalId {
    PrincipalId::from_u128(ALICE)
}

pub fn bob() -> PrincipalId {
    PrincipalId::from_u128(BOB)
}

pub fn carol() -> PrincipalId {
    PrincipalId::from_u128(CAROL)
}

pub fn id(raw: &str) -> RegionId {
    RegionId::new(raw).unwrap()
}

/// Axis-aligned box from `(x0, y0, z0)` to `(x1, y1, z1)`, inclusive.
pub fn cube(name: &str, min: (i32, i32, i32), max: (i32, i32, i32)) -> Region {
    Region::new(
        id(name),
        Bounds::cuboid(
            BlockVector::new(min.0, min.1, min.2),
            BlockVector::new(max.0, max.1, max.2),
        ),
    )
}

pub fn state(state: State) -> FlagSetting {
    FlagSetting::unrestricted(AttributeValue::State(state))
}

pub fn with_state(region: Region, key: AttributeKey, value: State) -> Region {
    region.with_flag(key, state(value)).unwrap()
}

/// Profiles for Alice, Bob and Carol, answered after `delay`.
pub fn profiles(delay: Duration) -> Arc<StaticProfileService> {
    Arc::new(
        StaticProfileService::new()
            .with_profile("Alice", alice())
            .with_profile("Bob", bob())
            .with_profile("Carol", carol())
            .with_delay(delay),
    )
}

pub fn engine(config: GuardConfig, profiles: Arc<StaticProfileService>) -> Engine {
    Engine::new(config, profiles, tokio::runtime::Handle::current())
}

/// Collects replies sent to a command source.
#[derive(Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<String> {
        self.messages.lock().unwrap().last().cloned()
    }
}

impl MessageSink for RecordingSink {
    fn send(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_owned());
    }
}

/// Tick `engine` until every background command has finished.
pub async fn settle(engine: &mut Engine) {
    for _ in 0..400 {
        engine.tick(Instant::now());
        if engine.supervisor().is_empty() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("background commands still running: {:?}", engine.supervisor().tasks());
}
