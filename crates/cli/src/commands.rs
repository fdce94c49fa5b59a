use anyhow::Result;
use railnet_core::{
    Booking, RailError, Railway, RecordStore, Station, StationClosureRequest, Track,
    TrackClosureRequest, Train,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::cli::{
    BookingCommand, ClosureCommand, ClosureKind, Command, StationCommand, TrackCommand,
    TrainArgs, TrainCommand,
};

/// Execute one command against the dataset and render its result.
pub fn execute<S: RecordStore>(railway: &Railway<S>, command: Command) -> Result<Value> {
    let output = match command {
        Command::Station(command) => station(railway, command)?,
        Command::Track(command) => track(railway, command)?,
        Command::Train(command) => train(railway, command)?,
        Command::Closure(command) => closure(railway, command)?,
        Command::Booking(command) => booking(railway, command)?,
        Command::Metrics => to_json(railway.metrics())?,
        Command::Dump => to_json(railway.snapshot().as_ref())?,
    };
    Ok(output)
}

fn station<S: RecordStore>(railway: &Railway<S>, command: StationCommand) -> Result<Value> {
    match command {
        StationCommand::Add {
            id,
            name,
            latitude,
            longitude,
        } => {
            let station = railway.add_station(Station {
                id,
                name,
                latitude,
                longitude,
            })?;
            Ok(json!({"status": "success", "station": station}))
        }
        StationCommand::Remove { id } => {
            railway.remove_station(&id)?;
            Ok(json!({"status": "success"}))
        }
        StationCommand::List => to_json(railway.stations()),
    }
}

fn track<S: RecordStore>(railway: &Railway<S>, command: TrackCommand) -> Result<Value> {
    match command {
        TrackCommand::Add {
            source,
            destination,
            distance,
            capacity,
            weight,
            bidirectional,
        } => {
            let track = railway.add_track(Track {
                weight: weight.unwrap_or(distance),
                source,
                destination,
                distance,
                capacity,
                bidirectional,
            })?;
            Ok(json!({"status": "success", "track": track}))
        }
        TrackCommand::Remove {
            source,
            destination,
        } => {
            railway.remove_track(&source, &destination)?;
            Ok(json!({"status": "success"}))
        }
        TrackCommand::List => to_json(railway.tracks()),
    }
}

fn train<S: RecordStore>(railway: &Railway<S>, command: TrainCommand) -> Result<Value> {
    match command {
        TrainCommand::Add(args) => {
            let train = railway.add_train(into_train(args))?;
            Ok(json!({
                "status": "success",
                "message": "Train added successfully",
                "train_id": train.id,
            }))
        }
        TrainCommand::Update { target, train } => {
            let train = railway.update_train(&target, into_train(train))?;
            Ok(json!({"status": "success", "train": train}))
        }
        TrainCommand::Remove { id } => {
            let remaining = railway.remove_train(&id)?;
            Ok(json!({
                "status": "success",
                "message": format!("Train {id} deleted successfully"),
                "remaining_trains": remaining,
            }))
        }
        TrainCommand::List => to_json(railway.trains()),
        TrainCommand::Check { stations } => to_json(railway.check_route(&stations)?),
    }
}

fn closure<S: RecordStore>(railway: &Railway<S>, command: ClosureCommand) -> Result<Value> {
    match command {
        ClosureCommand::AddStation {
            station_id,
            reason,
            duration,
        } => {
            let closure = railway.add_station_closure(StationClosureRequest {
                station_id,
                reason,
                duration_hours: duration,
            })?;
            Ok(json!({"status": "success", "closure": closure}))
        }
        ClosureCommand::AddTrack {
            source,
            destination,
            reason,
            duration,
            bidirectional,
        } => {
            let closure = railway.add_track_closure(TrackClosureRequest {
                source,
                destination,
                reason,
                duration_hours: duration,
                bidirectional,
            })?;
            Ok(json!({"status": "success", "closure": closure}))
        }
        ClosureCommand::RemoveStation { id } => {
            railway.remove_station_closure(&id)?;
            Ok(json!({"status": "success"}))
        }
        ClosureCommand::RemoveTrack { id } => {
            railway.remove_track_closure(&id)?;
            Ok(json!({"status": "success"}))
        }
        ClosureCommand::List { kind } => match kind {
            ClosureKind::Station => to_json(railway.active_station_closures()),
            ClosureKind::Track => to_json(railway.active_track_closures()),
            ClosureKind::All => Ok(json!({
                "station_closures": railway.active_station_closures(),
                "track_closures": railway.active_track_closures(),
            })),
        },
    }
}

fn booking<S: RecordStore>(railway: &Railway<S>, command: BookingCommand) -> Result<Value> {
    match command {
        BookingCommand::Add {
            booking_id,
            train_id,
            date,
            passengers,
            fare,
            status,
        } => {
            let booking = railway.add_booking(Booking {
                booking_id,
                train_id,
                date,
                passenger_count: passengers,
                fare,
                status: status.into(),
            })?;
            Ok(json!({"message": "Booking successful", "bookingId": booking.booking_id}))
        }
        BookingCommand::Cancel { id } => {
            railway.cancel_booking(&id)?;
            Ok(json!({"message": "Booking deleted successfully"}))
        }
        BookingCommand::Get { id } => to_json(railway.booking(&id)?),
        BookingCommand::List => to_json(railway.bookings()),
    }
}

fn into_train(args: TrainArgs) -> Train {
    Train {
        id: args.id,
        name: args.name,
        speed: args.speed,
        kind: args.kind,
        route: args.route,
        timings: args.timings,
    }
}

fn to_json(value: impl Serialize) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Process exit code for a failed command.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<RailError>() {
        Some(RailError::Validation(_)) => 2,
        Some(RailError::NotFound { .. }) => 3,
        Some(RailError::Conflict(_)) => 4,
        Some(RailError::Busy) => 5,
        Some(RailError::Storage(_)) => 6,
        None => 1,
    }
}

/// JSON body describing a failed command.
pub fn error_body(err: &anyhow::Error) -> Value {
    let retryable = err
        .downcast_ref::<RailError>()
        .map(RailError::is_retryable)
        .unwrap_or(false);
    json!({
        "status": "error",
        "message": format!("{err:#}"),
        "retryable": retryable,
    })
}
