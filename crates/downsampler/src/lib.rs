//! Downsampling algorithms shared by every cache level: stride-based point
//! averaging, and two time-bucketed variants that fall back to point
//! averaging once a bucket is small enough.

use std::collections::HashMap;

use common::{
    FilterType,
    Point,
    PointBatch,
    Schema,
    TimeCodec,
};
use value::{
    ColumnType,
    PointValue,
};

/// The number of points a time-weighted bucket is downsampled to before a
/// recursive split stops being worth it and point-based averaging takes
/// over.
const AVG_POINTS_PER_BUCKET: usize = 10;

/// Downsamples `batch` to (approximately) `num_of_points` points using
/// `filter`. A non-positive `num_of_points`, or a point count already at or
/// below the target, returns `batch` unchanged.
pub fn downsample(schema: &Schema, batch: &PointBatch, num_of_points: i64, filter: FilterType) -> PointBatch {
    if num_of_points <= 0 || batch.points.len() as i64 <= num_of_points {
        return batch.clone();
    }
    let target = num_of_points as usize;
    let points = match filter {
        FilterType::Points => apply_points(&batch.points, schema, target),
        FilterType::TimeWeightedPoints => apply_time_weighted(&batch.points, schema, target, filter),
        FilterType::TimeWeightedTime => apply_time_weighted(&batch.points, schema, target, filter),
    };
    PointBatch::new(batch.start_date.clone(), batch.end_date.clone(), points)
}

/// Averages `points` down to `num_of_points` points by splitting the slice
/// into roughly `len / num_of_points`-wide runs and averaging each run's
/// numeric columns. Text columns aren't averaged -- the last point of each
/// run carries its text value forward.
fn apply_points(points: &[Point], schema: &Schema, num_of_points: usize) -> Vec<Point> {
    if num_of_points == 0 || points.is_empty() {
        return Vec::new();
    }
    let len = points.len();
    let step = (len as f64 / num_of_points as f64).ceil().max(1.0) as usize;

    let columns: Vec<(&String, ColumnType)> = schema.columns.iter().map(|(k, v)| (k, *v)).collect();
    let mut sums: HashMap<&str, f64> = columns.iter().map(|(k, _)| (k.as_str(), 0.0)).collect();
    let mut prev_index: isize = -1;
    let mut out = Vec::new();

    for (i, point) in points.iter().enumerate() {
        for (name, ty) in &columns {
            if matches!(ty, ColumnType::Int | ColumnType::Real) {
                if let Some(v) = point.get(name) {
                    *sums.get_mut(name.as_str()).unwrap() += v.as_numeric();
                }
            }
        }

        let is_boundary = (i > 0 && (i + 1) % step == 0) || i == len - 1;
        if !is_boundary {
            continue;
        }

        let range = (i as isize - prev_index) as f64;
        let mut out_point = Point::new();
        for (name, ty) in &columns {
            match ty {
                ColumnType::Int | ColumnType::Real => {
                    let avg = sums[name.as_str()] / range;
                    if let Some(v) = PointValue::from_numeric_average(*ty, avg) {
                        out_point.insert((*name).clone(), v);
                    }
                    *sums.get_mut(name.as_str()).unwrap() = 0.0;
                },
                ColumnType::Text => {
                    if let Some(v) = point.get(name) {
                        out_point.insert((*name).clone(), v.clone());
                    }
                },
            }
        }
        prev_index = i as isize;
        out.push(out_point);
    }
    out
}

/// Splits `points` into fixed-duration time buckets sized so each holds
/// about [`AVG_POINTS_PER_BUCKET`] points on average, then downsamples each
/// bucket to its share of `num_of_points` -- by point averaging
/// (`TimeWeightedPoints`) or by recursing into a finer time bucketing
/// (`TimeWeightedTime`). Falls back to plain point averaging once
/// `num_of_points` is already small enough that bucketing wouldn't help.
fn apply_time_weighted(points: &[Point], schema: &Schema, num_of_points: usize, filter: FilterType) -> Vec<Point> {
    if num_of_points == 0 || points.is_empty() {
        return Vec::new();
    }
    if num_of_points <= AVG_POINTS_PER_BUCKET {
        return apply_points(points, schema, num_of_points);
    }

    let len = points.len();
    let start_time = points[0].date_key(schema).map(TimeCodec::parse_to_epoch).unwrap_or(-1);
    let end_time = points[len - 1].date_key(schema).map(TimeCodec::parse_to_epoch).unwrap_or(-1);
    let bucket_duration =
        ((end_time - start_time) as f64 / (num_of_points as f64 / AVG_POINTS_PER_BUCKET as f64)) as i64;

    let mut bucket_start = start_time;
    let mut bucket_end = start_time + bucket_duration;
    let mut bucket_size: usize = 0;
    let mut out = Vec::new();

    let downsample_bucket = |slice: &[Point], scaled: usize, out: &mut Vec<Point>| {
        if scaled == 0 {
            return;
        }
        match filter {
            FilterType::TimeWeightedPoints => out.extend(apply_points(slice, schema, scaled)),
            FilterType::TimeWeightedTime => out.extend(apply_time_weighted(slice, schema, scaled, filter)),
            FilterType::Points => unreachable!("apply_time_weighted is only ever called with a time-weighted filter"),
        }
    };

    for i in 0..len {
        let t = points[i].date_key(schema).map(TimeCodec::parse_to_epoch).unwrap_or(-1);
        if t >= bucket_start && t <= bucket_end {
            bucket_size += 1;
            continue;
        }
        let scaled = ((bucket_size as f64 / len as f64) * num_of_points as f64) as i64;
        downsample_bucket(&points[i - bucket_size..i], scaled.max(0) as usize, &mut out);
        bucket_size = 1;
        bucket_start += bucket_duration;
        bucket_end += bucket_duration;
    }

    let scaled = ((bucket_size as f64 / len as f64) * num_of_points as f64) as i64;
    downsample_bucket(&points[len - bucket_size..len], scaled.max(0) as usize, &mut out);

    out
}
