use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::drift_core::{
    ControlSample, ControlSource, FrameOutcome, Publication, SimSetup, SimulationContext,
};

/// Newest control sample from a client, held until the frame loop reads it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LatchedInput {
    pub sample: ControlSample,
}

impl ControlSource for LatchedInput {
    fn sample(&mut self) -> ControlSample {
        self.sample
    }
}

pub struct Car {
    pub id: String,
    pub ctx: SimulationContext,
    pub input: LatchedInput,
    pub published: Option<Publication>,
}

#[derive(Debug, Serialize)]
pub struct CarSnapshot {
    pub id: String,
    #[serde(flatten)]
    pub frame: Publication,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    Welcome { car_id: String },
    Pong,
    Snapshot { tick: u64, cars: Vec<CarSnapshot> },
}

impl ServerMessage {
    pub fn to_json(&self) -> Option<String> {
        match serde_json::to_string(self) {
            Ok(json) => Some(json),
            Err(err) => {
                warn!(%err, "failed to serialize server message");
                None
            }
        }
    }
}

pub struct SharedGameState {
    pub tick: u64,
    pub setup: SimSetup,
    pub clients: Vec<UnboundedSender<String>>,
    pub cars: HashMap<String, Car>,
}

impl SharedGameState {
    pub fn new(setup: SimSetup) -> Self {
        Self {
            tick: 0,
            setup,
            clients: Vec::new(),
            cars: HashMap::new(),
        }
    }

    pub fn register_client(&mut self, tx: UnboundedSender<String>) {
        self.clients.push(tx);
    }

    /// New car at the origin, all-zero state. Returns its id.
    pub fn add_car(&mut self) -> String {
        let id = Uuid::new_v4().to_string();
        self.cars.insert(
            id.clone(),
            Car {
                id: id.clone(),
                ctx: SimulationContext::new(&self.setup),
                input: LatchedInput::default(),
                published: None,
            },
        );
        info!(car = %id, cars = self.cars.len(), "car added");
        id
    }

    pub fn remove_car(&mut self, id: &str) {
        if self.cars.remove(id).is_some() {
            info!(car = %id, cars = self.cars.len(), "car removed");
        }
    }

    pub fn update_input(&mut self, id: &str, sample: ControlSample) {
        if let Some(car) = self.cars.get_mut(id) {
            car.input = LatchedInput { sample };
        }
    }

    pub fn reset_car(&mut self, id: &str) {
        if let Some(car) = self.cars.get_mut(id) {
            car.ctx.reset();
            car.input = LatchedInput::default();
            debug!(car = %id, "car reset");
        }
    }

    /// Run one frame for every car at host time `now` (seconds).
    pub fn step_all(&mut self, now: f64) {
        for car in self.cars.values_mut() {
            let outcome = car.ctx.run_frame(now, &mut car.input, &mut car.published);
            if outcome == FrameOutcome::Reset {
                warn!(car = %car.id, tick = self.tick, "car state blew up and was reset");
            }
        }
        self.tick += 1;
    }

    pub fn snapshot(&self) -> ServerMessage {
        let mut cars: Vec<CarSnapshot> = self
            .cars
            .values()
            .filter_map(|car| {
                car.published.map(|frame| CarSnapshot { id: car.id.clone(), frame })
            })
            .collect();
        cars.sort_by(|a, b| a.id.cmp(&b.id));

        ServerMessage::Snapshot { tick: self.tick, cars }
    }

    /// Build and send a snapshot of all cars to all clients; drops closed ones.
    pub fn broadcast_snapshot(&mut self) {
        let Some(json) = self.snapshot().to_json() else {
            return;
        };
        self.clients.retain(|tx| tx.send(json.clone()).is_ok());
    }
}
