//! Conversion between stored documents and domain records.

use ecoearn_core::model::{
    AccountStatus, Bin, BinId, FillLevel, GeoPoint, LedgerEntry, Material, NewLedgerEntry,
    Occupancy, OccupancyEvent, RecyclingRecord, Report, ReportId, TransactionId, TransactionKind,
    Transition, UserAccount, UserId,
};
use ecoearn_core::ports::StoreError;
use tracing::warn;

use crate::value::{Document, Fields, Value};

pub(crate) const BINS: &str = "bins";
pub(crate) const BIN_EVENTS: &str = "bin_events";
pub(crate) const REPORTS: &str = "reports";
pub(crate) const TRANSACTIONS: &str = "admin_transactions";
pub(crate) const USERS: &str = "users";
pub(crate) const RECYCLING: &str = "recycling_requests";

fn fields<const N: usize>(pairs: [(&str, Value); N]) -> Fields {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_owned(), value))
        .collect()
}

/// `status` wins over `currentUser`; inconsistent pairs collapse to inactive.
pub(crate) fn occupancy_from(
    document: &str,
    status: Option<&str>,
    current_user: Option<&str>,
) -> Occupancy {
    let user = current_user.map(str::trim).filter(|user| !user.is_empty());
    match (status, user) {
        (Some("active"), Some(user)) => Occupancy::held_by(UserId::from(user)),
        (Some("active"), None) => {
            warn!(document, "active bin without a current user, reading as inactive");
            Occupancy::Inactive
        }
        (_, Some(user)) => {
            warn!(document, user, "inactive bin still names a user, dropping it");
            Occupancy::Inactive
        }
        (_, None) => Occupancy::Inactive,
    }
}

pub(crate) fn occupancy_fields(occupancy: &Occupancy) -> Fields {
    fields([
        ("status", Value::string(occupancy.status())),
        (
            "currentUser",
            Value::optional_string(occupancy.occupant().map(UserId::as_str)),
        ),
    ])
}

pub(crate) fn bin_from(document: &Document) -> Result<Bin, StoreError> {
    let reader = document.reader();
    let status = reader.opt_string("status")?;
    let current_user = reader.opt_string("currentUser")?;

    let location = match (reader.opt_number("lat")?, reader.opt_number("lng")?) {
        (Some(lat), Some(lng)) => Some(GeoPoint { lat, lng }),
        _ => None,
    };

    let level = match reader.opt_integer("level")? {
        None => FillLevel::EMPTY,
        Some(raw) => FillLevel::try_from(raw).unwrap_or_else(|err| {
            warn!(document = %document.name, %err, "ignoring fill level");
            FillLevel::EMPTY
        }),
    };

    Ok(Bin {
        id: BinId::from(document.id()),
        name: reader.opt_string("name")?.unwrap_or_default(),
        location,
        level,
        occupancy: occupancy_from(&document.name, status.as_deref(), current_user.as_deref()),
        image: reader.opt_string("image")?,
        qr_data: reader.opt_string("qrData")?.filter(|data| !data.is_empty()),
    })
}

pub(crate) fn bin_fields(bin: &Bin) -> Fields {
    let mut out = fields([
        ("name", Value::string(bin.name.as_str())),
        ("image", Value::optional_string(bin.image.as_deref())),
        ("qrData", Value::string(bin.qr_data.as_deref().unwrap_or_default())),
        ("level", Value::integer(i64::from(bin.level))),
    ]);
    out.extend(occupancy_fields(&bin.occupancy));
    if let Some(location) = bin.location {
        out.insert(String::from("lat"), Value::double(location.lat));
        out.insert(String::from("lng"), Value::double(location.lng));
    }
    out
}

pub(crate) fn event_fields(event: &OccupancyEvent) -> Fields {
    fields([
        ("binId", Value::string(event.bin_id.as_str())),
        ("userId", Value::string(event.user_id.as_str())),
        ("transition", Value::string(event.transition.to_string())),
        ("timestamp", Value::timestamp(event.at)),
    ])
}

pub(crate) fn event_from(document: &Document) -> Result<OccupancyEvent, StoreError> {
    let reader = document.reader();
    let transition = match reader.string("transition")?.as_str() {
        "activated" => Transition::Activated,
        "deactivated" => Transition::Deactivated,
        "forced_release" => Transition::ForcedRelease,
        other => {
            return Err(StoreError::Decode {
                document: document.name.clone(),
                reason: format!("unknown transition `{other}`"),
            });
        }
    };
    Ok(OccupancyEvent {
        bin_id: BinId::from(reader.string("binId")?),
        user_id: UserId::from(reader.string("userId")?),
        transition,
        at: reader.timestamp("timestamp")?,
    })
}

pub(crate) fn report_from(document: &Document) -> Result<Report, StoreError> {
    let reader = document.reader();
    Ok(Report {
        id: ReportId::from(document.id()),
        user_name: reader.opt_string("userName")?.unwrap_or_default(),
        description: reader.opt_string("description")?.unwrap_or_default(),
        location: reader.opt_string("location")?.unwrap_or_default(),
        image: reader.opt_string("image")?,
        submitted_at: reader.timestamp("timestamp")?,
    })
}

pub(crate) fn ledger_fields(entry: &NewLedgerEntry) -> Fields {
    fields([
        ("type", Value::string(entry.kind.tag())),
        ("amount", Value::decimal(entry.amount)),
        ("description", Value::string(entry.description.as_str())),
        ("timestamp", Value::timestamp(entry.recorded_at)),
    ])
}

pub(crate) fn ledger_from(document: &Document) -> Result<LedgerEntry, StoreError> {
    let reader = document.reader();
    let kind = match reader.string("type")?.as_str() {
        "add" => TransactionKind::Add,
        "withdraw" => TransactionKind::Withdraw,
        other => {
            return Err(StoreError::Decode {
                document: document.name.clone(),
                reason: format!("unknown transaction type `{other}`"),
            });
        }
    };
    Ok(LedgerEntry {
        id: TransactionId::from(document.id()),
        kind,
        amount: reader.decimal("amount")?,
        description: reader.opt_string("description")?.unwrap_or_default(),
        recorded_at: reader.timestamp("timestamp")?,
    })
}

pub(crate) fn user_from(document: &Document) -> Result<UserAccount, StoreError> {
    let reader = document.reader();
    let status = match reader.opt_string("status")?.as_deref() {
        Some("inactive") => AccountStatus::Inactive,
        _ => AccountStatus::Active,
    };
    Ok(UserAccount {
        id: UserId::from(document.id()),
        name: reader.opt_string("name")?.unwrap_or_default(),
        status,
    })
}

fn material_from(raw: &str) -> Option<Material> {
    let raw = raw.to_lowercase();
    if raw.contains("plastic") {
        Some(Material::Plastic)
    } else if raw.contains("tin") || raw.contains("can") {
        Some(Material::TinCans)
    } else {
        None
    }
}

/// `None` for deposits of materials the dashboard does not chart.
pub(crate) fn recycling_from(document: &Document) -> Result<Option<RecyclingRecord>, StoreError> {
    let reader = document.reader();
    let raw = match reader.opt_string("material")? {
        Some(raw) => raw,
        None => reader.opt_string("materialType")?.unwrap_or_default(),
    };
    let Some(material) = material_from(&raw) else {
        warn!(document = %document.name, material = %raw, "skipping deposit of unknown material");
        return Ok(None);
    };

    let points = reader.opt_integer("points")?.unwrap_or_default();
    Ok(Some(RecyclingRecord {
        id: document.id().to_owned(),
        user_id: UserId::from(reader.opt_string("userId")?.unwrap_or_default()),
        user_name: reader.opt_string("userName")?.unwrap_or_default(),
        material,
        quantity: reader.opt_number("quantity")?.unwrap_or_default(),
        points: u32::try_from(points).unwrap_or_default(),
        recorded_at: reader.timestamp("timestamp")?,
        profile_picture: reader.opt_string("profilePicture")?,
    }))
}
