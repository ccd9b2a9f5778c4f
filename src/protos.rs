//! Persisted records.
//!
//! The messages are wire-compatible with the `mcfs.protos` Protocol Buffers schema,
//! and also render as JSON for the text format.

use prost::Message;
use serde::{Deserialize, Serialize};

use crate::dataset::Precision;
use crate::model::pmf::MatrixInit;
use crate::similarity::Similarity;

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default)]
pub struct Rating {
    #[prost(uint32, tag = "1")]
    pub user: u32,

    #[prost(uint32, tag = "2")]
    pub item: u32,

    #[prost(float, repeated, tag = "3")]
    pub scores: Vec<f32>,
}

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default)]
pub struct Ratings {
    #[prost(message, repeated, tag = "1")]
    pub ratings: Vec<Rating>,

    #[prost(uint32, tag = "2")]
    pub criteria_size: u32,

    #[prost(uint32, tag = "3")]
    pub num_users: u32,

    #[prost(uint32, tag = "4")]
    pub num_items: u32,

    #[prost(float, repeated, tag = "5")]
    pub minv: Vec<f32>,

    #[prost(float, repeated, tag = "6")]
    pub maxv: Vec<f32>,

    #[prost(enumeration = "Precision", repeated, tag = "7")]
    pub precision: Vec<i32>,
}

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default)]
pub struct NeighboursModelConfig {
    #[prost(message, optional, tag = "1")]
    pub ratings: Option<Ratings>,

    #[prost(uint32, tag = "2")]
    pub k: u32,

    #[prost(enumeration = "Similarity", tag = "3")]
    pub similarity: i32,
}

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default)]
pub struct PmfModelConfig {
    #[prost(message, optional, tag = "1")]
    pub ratings: Option<Ratings>,

    #[prost(float, repeated, tag = "2")]
    pub y: Vec<f32>,

    #[prost(float, repeated, tag = "3")]
    pub v: Vec<f32>,

    #[prost(float, repeated, tag = "4")]
    pub w: Vec<f32>,

    #[prost(float, repeated, tag = "5")]
    pub hy: Vec<f32>,

    #[prost(uint32, tag = "6")]
    pub factors: u32,

    #[prost(uint32, tag = "7")]
    pub max_iters: u32,

    #[prost(uint32, tag = "8")]
    pub batch_size: u32,

    #[prost(float, tag = "9")]
    pub learning_rate: f32,

    #[prost(float, tag = "10")]
    pub momentum: f32,

    #[prost(float, tag = "11")]
    pub ly: f32,

    #[prost(float, tag = "12")]
    pub lv: f32,

    #[prost(float, tag = "13")]
    pub lw: f32,

    #[prost(enumeration = "MatrixInit", tag = "14")]
    pub matrix_init: i32,
}
