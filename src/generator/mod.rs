//! Synthetic order records
//!
//! Produces the newline-delimited JSON input the publisher consumes: one
//! rental order per line, followed by a single empty line that marks the end
//! of input. Names, streets and phone numbers are drawn from small fixed
//! tables; they only need to look plausible.

use std::io::{self, Write};

use chrono::{NaiveDate, SecondsFormat, Utc};
use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const INVENTORY: &[&str] = &[
    "Peugeot 208",
    "Peugeot 3008",
    "Citroen C3",
    "Renault Megane",
    "Fiat 500e",
    "Maserati Grecale Folgore",
    "Renault Mégane E-Tech",
    "Peugeot e-208",
    "Peugeot e-3008",
    "Citroen ë-C4",
    "Citroen Ami",
    "DS 3 E-Tense",
    "DS 4 E-Tense",
    "DS 7 E-Tense",
    "DS 9 E-Tense",
    "Fiat 600e",
    "Jeep Avenger EV",
    "Opel Mokka-e",
    "Opel Corsa-e",
    "Opel Astra Electric",
    "Peugeot e-2008",
    "Citroen ë-Berlingo",
    "Fiat E-Ulysse",
    "Peugeot e-Rifter",
    "Jeep Recon EV",
    "Jeep Wagoneer S",
    "Maserati GranTurismo Folgore",
    "Maserati MC20 Folgore",
    "Opel Zafira-e Life",
];

const FIRST_NAMES: &[&str] = &[
    "Alice", "Bruno", "Chloe", "Daniel", "Elena", "Farid", "Grace", "Hugo", "Ines", "Jonas",
    "Keiko", "Luca", "Maya", "Nathan", "Olivia", "Pavel", "Rosa", "Samir", "Tara", "Victor",
];

const LAST_NAMES: &[&str] = &[
    "Anderson", "Bernard", "Costa", "Dubois", "Evans", "Fischer", "Garcia", "Haddad", "Ito",
    "Jensen", "Kowalski", "Lambert", "Moreau", "Nguyen", "Okafor", "Petit", "Rossi", "Schmidt",
];

const STREETS: &[&str] = &[
    "Main St", "Oak Ave", "Maple Dr", "Cedar Ln", "Pine St", "Elm St", "Lake Rd", "Hill Ct",
];

/// (city, state, zip prefix)
const CITIES: &[(&str, &str, u32)] = &[
    ("Austin", "TX", 787),
    ("Denver", "CO", 802),
    ("Portland", "OR", 972),
    ("Columbus", "OH", 432),
    ("Raleigh", "NC", 276),
    ("Sacramento", "CA", 958),
    ("Madison", "WI", 537),
    ("Boise", "ID", 837),
];

const EMAIL_DOMAINS: &[&str] = &["example.com", "example.org", "example.net"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Address {
    pub street_address: String,
    pub city: String,
    pub state: String,
    pub postalcode: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmergencyContact {
    pub name: String,
    pub phone: String,
}

/// One rental order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderRecord {
    pub txid: String,
    pub rfid: String,
    pub item: String,
    pub purchase_time: String,
    pub expiration_time: String,
    pub days: u32,
    pub name: String,
    pub address: Option<Address>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub emergency_contact: Option<EmergencyContact>,
}

pub struct OrderGenerator<R: Rng> {
    rng: R,
    expiration: NaiveDate,
}

impl<R: Rng> OrderGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            expiration: NaiveDate::from_ymd_opt(2023, 6, 1).unwrap_or_default(),
        }
    }

    fn pick(&mut self, table: &[&'static str]) -> &'static str {
        table.choose(&mut self.rng).copied().unwrap_or_default()
    }

    fn full_name(&mut self) -> String {
        format!("{} {}", self.pick(FIRST_NAMES), self.pick(LAST_NAMES))
    }

    fn phone(&mut self) -> String {
        format!(
            "({:03}) {:03}-{:04}",
            self.rng.random_range(201..=989),
            self.rng.random_range(200..=999),
            self.rng.random_range(0..=9999)
        )
    }

    fn address(&mut self) -> Address {
        let (city, state, zip_prefix) = *CITIES.choose(&mut self.rng).unwrap_or(&CITIES[0]);
        Address {
            street_address: format!(
                "{} {}",
                self.rng.random_range(1..=9999),
                self.pick(STREETS)
            ),
            city: city.to_string(),
            state: state.to_string(),
            postalcode: format!("{zip_prefix}{:02}", self.rng.random_range(0..100)),
        }
    }

    /// `Some(value)` half of the time.
    fn maybe<T>(&mut self, value: impl FnOnce(&mut Self) -> T) -> Option<T> {
        if self.rng.random_bool(0.5) {
            Some(value(self))
        } else {
            None
        }
    }

    pub fn next_record(&mut self) -> OrderRecord {
        let rfid_bits: u128 = self.rng.random::<u128>() >> 32;
        let name = self.full_name();

        OrderRecord {
            txid: Uuid::new_v4().to_string(),
            rfid: format!("{rfid_bits:#x}"),
            item: self.pick(INVENTORY).to_string(),
            purchase_time: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            expiration_time: self.expiration.format("%Y-%m-%d").to_string(),
            days: self.rng.random_range(1..=7),
            address: self.maybe(Self::address),
            phone: self.maybe(Self::phone),
            email: self.maybe(|g| {
                let domain = g.pick(EMAIL_DOMAINS);
                format!("{}@{domain}", name.to_lowercase().replace(' ', "."))
            }),
            emergency_contact: self.maybe(|g| EmergencyContact {
                name: g.full_name(),
                phone: g.phone(),
            }),
            name,
        }
    }

    /// Writes `count` records, one JSON object per line, then the empty
    /// end-of-input line.
    pub fn write_records<W: Write>(&mut self, count: usize, mut out: W) -> io::Result<()> {
        for _ in 0..count {
            let record = self.next_record();
            serde_json::to_writer(&mut out, &record)?;
            out.write_all(b"\n")?;
        }
        out.write_all(b"\n")?;
        out.flush()
    }
}
