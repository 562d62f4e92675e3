use serde::Deserialize;

use crate::{
    error::{Error, Result},
    types::{HandLandmarks, Point2},
};

/// One detected hand as it appears in traces and detector replies.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum HandRecord {
    Named {
        wrist: Vec<f32>,
        thumb_tip: Vec<f32>,
        index_finger_tip: Vec<f32>,
    },
    Points {
        points: Vec<Vec<f32>>,
    },
}

impl HandRecord {
    pub fn to_landmarks(&self) -> Result<HandLandmarks> {
        match self {
            HandRecord::Named {
                wrist,
                thumb_tip,
                index_finger_tip,
            } => Ok(HandLandmarks::new(
                point(wrist)?,
                point(thumb_tip)?,
                point(index_finger_tip)?,
            )),
            HandRecord::Points { points } => {
                let points = points
                    .iter()
                    .map(|p| point(p))
                    .collect::<Result<Vec<_>>>()?;
                HandLandmarks::from_points(&points)
            }
        }
    }
}

/// Accepts `[x, y]` or `[x, y, z]`; depth is dropped.
fn point(coords: &[f32]) -> Result<Point2> {
    match coords {
        [x, y] | [x, y, _] => Ok(Point2::new(*x, *y)),
        other => Err(Error::Landmarks(format!(
            "expected 2 or 3 coordinates, got {}",
            other.len()
        ))),
    }
}

/// Parses a detector reply or trace `hand` value; `null` means no hand.
pub fn parse_hand(line: &str, line_no: usize) -> Result<Option<HandLandmarks>> {
    let record: Option<HandRecord> =
        serde_json::from_str(line).map_err(|source| Error::Record {
            line: line_no,
            source,
        })?;
    record.as_ref().map(HandRecord::to_landmarks).transpose()
}
