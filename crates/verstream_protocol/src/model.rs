//! Payloads of the entity variants.
//!
//! Field names follow the JSON written by existing clients (camelCase).
//! Nullable fields are `Option`s and are written as explicit `null`.

// Self-describing wire fields.
#![allow(missing_docs)]

use crate::types::{EntityId, Version};
use serde::{Deserialize, Serialize};

/// An aircraft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aircraft {
    /// Registration mark, e.g. `PH-ABC`.
    pub registration: String,
    /// ICAO type designator.
    pub model: String,
}

/// An aerodrome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aerodrome {
    /// ICAO location indicator.
    pub code: String,
}

/// A trip: a named sequence of flights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    /// Display name.
    pub name: String,
    /// Aircraft snapshot the trip is planned with.
    pub aircraft: Option<Version>,
}

/// Flight planning data attached to a trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripPlan {
    /// The trip this plan belongs to.
    pub trip: EntityId,
    pub power_setting: Option<String>,
    pub ias: Option<f64>,
    pub tas: Option<f64>,
    pub fuel_flow: Option<f64>,
    pub variation: Option<f64>,
    pub fuel_contingency: Option<f64>,
    pub final_reserve: Option<f64>,
    pub pre_takeoff_time: Option<f64>,
    pub pre_takeoff_fuel: Option<f64>,
    pub post_takeoff_time: Option<f64>,
    pub pre_landing_time: Option<f64>,
    pub post_landing_time: Option<f64>,
    pub post_landing_fuel: Option<f64>,
    /// Stops, in order.
    #[serde(default)]
    pub stops: Vec<Stop>,
    /// One plan per leg between stops.
    #[serde(default)]
    pub flight_plans: Vec<FlightPlan>,
}

/// A stop on a trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    /// Aerodrome snapshot.
    pub aerodrome: Version,
    /// Whether the aircraft is refuelled here.
    pub refuel: bool,
}

/// Waypoints and legs between two stops.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FlightPlan {
    #[serde(default)]
    pub waypoints: Vec<Waypoint>,
    #[serde(default)]
    pub legs: Vec<Leg>,
}

/// Kind of waypoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WaypointType {
    TakeOff,
    Simple,
    RateOne,
    Landing,
}

/// A waypoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: WaypointType,
    pub altitude: Option<f64>,
    pub eta: Option<f64>,
}

/// A leg between two waypoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Leg {
    pub true_track: Option<f64>,
    pub distance: Option<f64>,
    pub wind_direction: Option<f64>,
    pub wind_velocity: Option<f64>,
    pub altitude: Option<f64>,
    pub msa: Option<f64>,
    pub ete: Option<f64>,
    #[serde(default)]
    pub notes: Vec<Note>,
}

/// A timed note on a leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub time: Option<f64>,
    pub note: String,
    pub number: String,
}

/// Calendar date as stored in logbook entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogDate {
    pub y: i32,
    pub m: u8,
    pub d: u8,
}

/// A line in the pilot logbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogbookEntry {
    pub page: i64,
    pub line: i64,
    pub date: Option<LogDate>,
    /// Departure aerodrome snapshot.
    pub from: Option<Version>,
    /// Arrival aerodrome snapshot.
    pub to: Option<Version>,
    pub departure: Option<f64>,
    pub arrival: Option<f64>,
    /// Aircraft snapshot.
    pub aircraft: Option<Version>,
    pub landings: Option<i64>,
    pub pic: Option<f64>,
    pub dual: Option<f64>,
    pub trip: Option<EntityId>,
}
