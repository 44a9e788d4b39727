// Copyright 2025 coScene
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Operator-driven annotations: the live maneuver label and the phone position

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::error::RecorderError;

/// Maneuver the driver is performing at sample time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum Maneuver {
    #[default]
    #[serde(rename = "Cruising")]
    Cruising = 0,
    #[serde(rename = "Braking")]
    Braking = 1,
    #[serde(rename = "Lane Left")]
    LaneLeft = 2,
    #[serde(rename = "Lane Right")]
    LaneRight = 3,
    #[serde(rename = "Pullover")]
    Pullover = 4,
}

impl Maneuver {
    pub const ALL: [Maneuver; 5] = [
        Maneuver::Cruising,
        Maneuver::Braking,
        Maneuver::LaneLeft,
        Maneuver::LaneRight,
        Maneuver::Pullover,
    ];

    /// String written to the `label` column
    pub fn as_str(self) -> &'static str {
        match self {
            Maneuver::Cruising => "Cruising",
            Maneuver::Braking => "Braking",
            Maneuver::LaneLeft => "Lane Left",
            Maneuver::LaneRight => "Lane Right",
            Maneuver::Pullover => "Pullover",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => Maneuver::Braking,
            2 => Maneuver::LaneLeft,
            3 => Maneuver::LaneRight,
            4 => Maneuver::Pullover,
            _ => Maneuver::Cruising,
        }
    }
}

impl fmt::Display for Maneuver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Maneuver {
    type Err = RecorderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "cruising" | "cruise" | "reset" => Ok(Maneuver::Cruising),
            "braking" | "brake" => Ok(Maneuver::Braking),
            "laneleft" | "left" => Ok(Maneuver::LaneLeft),
            "laneright" | "right" => Ok(Maneuver::LaneRight),
            "pullover" | "pullingover" => Ok(Maneuver::Pullover),
            _ => Err(RecorderError::InvalidCommand(format!(
                "unknown label '{}'",
                s.trim()
            ))),
        }
    }
}

/// Where the phone sits in the vehicle for the whole session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PhonePosition {
    #[default]
    #[serde(rename = "Mount (Fixed)", alias = "mount")]
    Mount,
    #[serde(rename = "Cup Holder", alias = "cup_holder")]
    CupHolder,
    #[serde(rename = "Bag/Pocket", alias = "bag_or_pocket")]
    BagOrPocket,
}

impl PhonePosition {
    /// String written to the `phone_position` column
    pub fn as_str(self) -> &'static str {
        match self {
            PhonePosition::Mount => "Mount (Fixed)",
            PhonePosition::CupHolder => "Cup Holder",
            PhonePosition::BagOrPocket => "Bag/Pocket",
        }
    }
}

impl fmt::Display for PhonePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PhonePosition {
    type Err = RecorderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "mount" | "mountfixed" | "fixed" => Ok(PhonePosition::Mount),
            "cupholder" | "cup" => Ok(PhonePosition::CupHolder),
            "bagorpocket" | "bagpocket" | "bag" | "pocket" => Ok(PhonePosition::BagOrPocket),
            _ => Err(RecorderError::InvalidCommand(format!(
                "unknown phone position '{}'",
                s.trim()
            ))),
        }
    }
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Currently active maneuver label.
///
/// A single atomic byte: `set` is visible to the very next `get`, and a burst
/// of changes between two sensor ticks collapses to the last one.
#[derive(Debug, Default)]
pub struct LabelState {
    current: AtomicU8,
}

impl LabelState {
    pub fn new(initial: Maneuver) -> Self {
        Self {
            current: AtomicU8::new(initial as u8),
        }
    }

    pub fn set(&self, label: Maneuver) {
        self.current.store(label as u8, Ordering::Release);
    }

    pub fn get(&self) -> Maneuver {
        Maneuver::from_u8(self.current.load(Ordering::Acquire))
    }
}
