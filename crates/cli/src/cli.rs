use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use railnet_core::BookingStatus;
use serde_json::Value;

#[derive(Parser, Debug)]
#[command(
    name = "railnet",
    author,
    version,
    about = "Manage a rail network's stations, tracks, trains and closures",
    long_about = "Maintains a JSON dataset of stations, tracks, trains and bookings.\n\n\
                  Stations and tracks can be closed for a number of hours; new trains are \
                  only admitted when every hop of their route is open."
)]
pub struct Cli {
    /// Config file to read instead of the per-user default
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Dataset file, overriding the configured one
    #[arg(long, global = true)]
    pub data_file: Option<PathBuf>,

    /// Print every event on stderr, not just warnings
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Stations of the network
    #[command(subcommand)]
    Station(StationCommand),
    /// Track edges between stations
    #[command(subcommand)]
    Track(TrackCommand),
    /// Trains and their routes
    #[command(subcommand)]
    Train(TrainCommand),
    /// Temporary station and track closures
    #[command(subcommand)]
    Closure(ClosureCommand),
    /// Passenger bookings
    #[command(subcommand)]
    Booking(BookingCommand),
    /// Record counts
    Metrics,
    /// Print the whole dataset
    Dump,
}

#[derive(Subcommand, Debug)]
pub enum StationCommand {
    /// Register a station
    Add {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long, allow_hyphen_values = true)]
        latitude: f64,
        #[arg(long, allow_hyphen_values = true)]
        longitude: f64,
    },
    /// Remove a station that no track uses
    Remove { id: String },
    /// List stations
    List,
}

#[derive(Subcommand, Debug)]
pub enum TrackCommand {
    /// Register a track from SOURCE to DESTINATION
    Add {
        #[arg(long)]
        source: String,
        #[arg(long)]
        destination: String,
        #[arg(long)]
        distance: f64,
        #[arg(long)]
        capacity: u32,
        /// Routing weight, defaults to the distance
        #[arg(long)]
        weight: Option<f64>,
        /// Allow travel from DESTINATION to SOURCE as well
        #[arg(long)]
        bidirectional: bool,
    },
    /// Remove the track keyed SOURCE -> DESTINATION
    Remove { source: String, destination: String },
    /// List tracks
    List,
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    #[arg(long)]
    pub id: String,
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub speed: f64,
    /// Train category, e.g. express or passenger
    #[arg(long = "type")]
    pub kind: String,
    /// Comma separated station ids in travel order
    #[arg(long, value_delimiter = ',', required = true)]
    pub route: Vec<String>,
    /// Timetable as a JSON document
    #[arg(long, value_parser = parse_json, default_value = "null")]
    pub timings: Value,
}

#[derive(Subcommand, Debug)]
pub enum TrainCommand {
    /// Create a train if its route is open
    Add(TrainArgs),
    /// Replace a train record without re-checking closures
    Update {
        /// Id of the train to replace
        target: String,
        #[command(flatten)]
        train: TrainArgs,
    },
    /// Delete a train
    Remove { id: String },
    /// List trains
    List,
    /// Check whether a route could be run right now
    Check {
        #[arg(required = true)]
        stations: Vec<String>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ClosureKind {
    Station,
    Track,
    All,
}

#[derive(Subcommand, Debug)]
pub enum ClosureCommand {
    /// Close a station for a number of hours
    AddStation {
        #[arg(long)]
        station_id: String,
        #[arg(long)]
        reason: String,
        /// Hours the closure lasts
        #[arg(long, allow_hyphen_values = true)]
        duration: f64,
    },
    /// Close a track for a number of hours
    AddTrack {
        #[arg(long)]
        source: String,
        #[arg(long)]
        destination: String,
        #[arg(long)]
        reason: String,
        /// Hours the closure lasts
        #[arg(long, allow_hyphen_values = true)]
        duration: f64,
        /// Close the reverse direction too
        #[arg(long)]
        bidirectional: bool,
    },
    /// Delete a station closure
    RemoveStation { id: String },
    /// Delete a track closure
    RemoveTrack { id: String },
    /// List active closures
    List {
        #[arg(long, value_enum, default_value_t = ClosureKind::All)]
        kind: ClosureKind,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum StatusArg {
    Confirmed,
    Pending,
    Cancelled,
}

impl From<StatusArg> for BookingStatus {
    fn from(status: StatusArg) -> Self {
        match status {
            StatusArg::Confirmed => BookingStatus::Confirmed,
            StatusArg::Pending => BookingStatus::Pending,
            StatusArg::Cancelled => BookingStatus::Cancelled,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum BookingCommand {
    /// Book seats on a train
    Add {
        #[arg(long)]
        booking_id: String,
        #[arg(long)]
        train_id: String,
        /// Travel date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
        #[arg(long, default_value_t = 1)]
        passengers: u32,
        #[arg(long)]
        fare: f64,
        #[arg(long, value_enum, default_value_t = StatusArg::Confirmed)]
        status: StatusArg,
    },
    /// Cancel a booking
    Cancel { id: String },
    /// Show one booking
    Get { id: String },
    /// List bookings
    List,
}

fn parse_json(raw: &str) -> Result<Value, String> {
    serde_json::from_str(raw).map_err(|err| format!("invalid JSON: {err}"))
}
