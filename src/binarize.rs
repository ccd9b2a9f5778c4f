//! Converts the textual ratings into a dataset file.

use std::fs;
use std::io::{self, Read};
use std::str::FromStr;

use crate::dataset::{Dataset, Precision};
use crate::opts::BinarizeOpts;
use crate::persistence::Format;
use crate::prelude::*;
use crate::protos;

#[instrument(level = "info", skip_all, fields(input = ?opts.input_path))]
pub fn run(opts: BinarizeOpts) -> Result {
    let text = match &opts.input_path {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("failed to read `{:?}`", path))?
        }
        None => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("failed to read the standard input")?;
            text
        }
    };

    let dataset = build(&text, opts.minv, opts.maxv, &opts.precision)?;
    info!(
        n_ratings = dataset.len(),
        n_users = dataset.users(),
        n_items = dataset.items(),
        criteria_size = dataset.criteria_size(),
        "parsed",
    );
    dataset.save(&opts.output_path, Format::from_text_flag(opts.text))
}

/// Explicit bounds override the scanned ones.
fn build(text: &str, minv: Vec<f32>, maxv: Vec<f32>, precision: &[Precision]) -> Result<Dataset> {
    let ratings = parse_ratings(text)?;
    let criteria_size = ratings.first().map_or(0, |rating| rating.scores.len());
    for (name, bounds) in [("minimum", &minv), ("maximum", &maxv)] {
        if !bounds.is_empty() && bounds.len() != criteria_size {
            bail!("expected {} {} scores, got {}", criteria_size, name, bounds.len());
        }
    }
    let dataset = Dataset::from_record(protos::Ratings {
        ratings,
        criteria_size: criteria_size as u32,
        precision: precision.iter().map(|precision| *precision as i32).collect(),
        ..Default::default()
    })?;
    let minv = if minv.is_empty() { dataset.minv().to_vec() } else { minv };
    let maxv = if maxv.is_empty() { dataset.maxv().to_vec() } else { maxv };
    Ok(dataset.with_bounds(minv, maxv))
}

/// Parses `user item score…` lines, skipping the blank ones and `#` comments.
fn parse_ratings(text: &str) -> Result<Vec<protos::Rating>> {
    let mut ratings: Vec<protos::Rating> = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let rating = parse_line(line).with_context(|| format!("invalid line #{}", i + 1))?;
        if let Some(first) = ratings.first() {
            if first.scores.len() != rating.scores.len() {
                bail!(
                    "line #{} has {} scores, expected {}",
                    i + 1,
                    rating.scores.len(),
                    first.scores.len(),
                );
            }
        }
        ratings.push(rating);
    }
    Ok(ratings)
}

fn parse_line(line: &str) -> Result<protos::Rating> {
    let mut fields = line.split_whitespace();
    let user = fields.next().ok_or_else(|| anyhow!("missing user"))?;
    let item = fields.next().ok_or_else(|| anyhow!("missing item"))?;
    let scores = fields.map(f32::from_str).collect::<Result<Vec<_>, _>>()?;
    if scores.is_empty() {
        bail!("no scores");
    }
    Ok(protos::Rating {
        user: u32::from_str(user).with_context(|| format!("invalid user `{}`", user))?,
        item: u32::from_str(item).with_context(|| format!("invalid item `{}`", item))?,
        scores,
    })
}
