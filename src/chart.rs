//! # Raster Chart Rendering
//!
//! Draws the combined source and prediction dataset with `embedded-graphics`
//! onto any `Rgb888` draw target. [`RasterCanvas`] is an in-memory target
//! that can be written out as a binary PPM image, which most image viewers
//! open directly.
//!
//! ## Layout
//! - Legend along the top margin
//! - Level labels and horizontal grid lines on round values at the left
//! - First, middle and last instants under the time axis
//! - One polyline per series, source in blue and prediction in orange

use crate::harmonics::hours_between;
use crate::renderer::{format_level, label_levels, label_step};
use crate::{LevelPoint, LevelTable, SeriesKind};
use embedded_graphics::{
    mono_font::{ascii::FONT_6X10, MonoTextStyle},
    pixelcolor::Rgb888,
    prelude::*,
    primitives::{Line, PrimitiveStyle},
    text::{Alignment, Baseline, Text, TextStyleBuilder},
};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use thiserror::Error;
use tracing::info;

pub const BACKGROUND: Rgb888 = Rgb888::new(255, 255, 255);
pub const AXIS_COLOR: Rgb888 = Rgb888::new(0, 0, 0);
pub const GRID_COLOR: Rgb888 = Rgb888::new(220, 220, 220);
pub const SOURCE_COLOR: Rgb888 = Rgb888::new(31, 119, 180);
pub const PREDICTION_COLOR: Rgb888 = Rgb888::new(255, 127, 14);

// Margins around the plot area, in pixels
const LEFT: i32 = 56;
const RIGHT: i32 = 16;
const TOP: i32 = 24;
const BOTTOM: i32 = 28;

/// Smallest target the layout fits on.
pub const MIN_WIDTH: u32 = 160;
pub const MIN_HEIGHT: u32 = 100;

/// Largest image `save_chart` allocates.
pub const MAX_WIDTH: u32 = 8192;
pub const MAX_HEIGHT: u32 = 8192;

#[derive(Error, Debug)]
pub enum ChartError {
    #[error(
        "chart size {width}x{height} is below the minimum {min_width}x{min_height}",
        min_width = MIN_WIDTH,
        min_height = MIN_HEIGHT
    )]
    TooSmall { width: u32, height: u32 },

    #[error(
        "chart size {width}x{height} is above the maximum {max_width}x{max_height}",
        max_width = MAX_WIDTH,
        max_height = MAX_HEIGHT
    )]
    TooLarge { width: u32, height: u32 },

    #[error("no data to chart")]
    Empty,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// An `Rgb888` framebuffer.
pub struct RasterCanvas {
    width: u32,
    height: u32,
    pixels: Vec<Rgb888>,
}

impl RasterCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![BACKGROUND; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb888> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.pixels[self.index(x, y)])
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, color: Rgb888) {
        if x >= self.width || y >= self.height {
            return;
        }
        let index = self.index(x, y);
        self.pixels[index] = color;
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Number of pixels of exactly `color`.
    pub fn count(&self, color: Rgb888) -> usize {
        self.pixels.iter().filter(|&&p| p == color).count()
    }

    /// Write a binary (`P6`) PPM image.
    pub fn write_ppm<W: Write>(&self, mut out: W) -> io::Result<()> {
        write!(out, "P6\n{} {}\n255\n", self.width, self.height)?;
        let bytes: Vec<u8> = self
            .pixels
            .iter()
            .flat_map(|p| [p.r(), p.g(), p.b()])
            .collect();
        out.write_all(&bytes)?;
        out.flush()
    }

    pub fn save_ppm<P: AsRef<Path>>(&self, path: P) -> Result<(), ChartError> {
        let file = File::create(path.as_ref())?;
        self.write_ppm(BufWriter::new(file))?;
        info!(
            path = %path.as_ref().display(),
            width = self.width,
            height = self.height,
            "chart written"
        );
        Ok(())
    }
}

impl OriginDimensions for RasterCanvas {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for RasterCanvas {
    type Color = Rgb888;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x >= 0 && point.y >= 0 {
                self.set_pixel(point.x as u32, point.y as u32, color);
            }
        }
        Ok(())
    }
}

fn series_color(kind: SeriesKind) -> Rgb888 {
    match kind {
        SeriesKind::Source => SOURCE_COLOR,
        SeriesKind::Prediction => PREDICTION_COLOR,
    }
}

/// Render the combined dataset onto a draw target.
pub fn draw_chart<D>(table: &LevelTable, display: &mut D) -> Result<(), ChartError>
where
    D: DrawTarget<Color = Rgb888, Error = core::convert::Infallible>,
{
    let size = display.bounding_box().size;
    if size.width < MIN_WIDTH || size.height < MIN_HEIGHT {
        return Err(ChartError::TooSmall {
            width: size.width,
            height: size.height,
        });
    }
    let (Some((min_level, max_level)), Some((first, last))) =
        (table.level_bounds(), table.time_bounds())
    else {
        return Err(ChartError::Empty);
    };

    let width = size.width as i32;
    let height = size.height as i32;
    let (x0, x1) = (LEFT, width - RIGHT);
    let (y0, y1) = (TOP, height - BOTTOM);
    let span = hours_between(first, last);

    let level_to_y = |level: f64| {
        if max_level <= min_level {
            return (y0 + y1) / 2;
        }
        let normalized = (level - min_level) / (max_level - min_level);
        y1 - (normalized * (y1 - y0) as f64).round() as i32
    };
    let point_at = |p: &LevelPoint| {
        let x = if span <= 0.0 {
            (x0 + x1) / 2
        } else {
            x0 + (hours_between(first, p.time) / span * (x1 - x0) as f64).round() as i32
        };
        Point::new(x, level_to_y(p.level))
    };

    display.clear(BACKGROUND).ok();

    let text_style = MonoTextStyle::new(&FONT_6X10, AXIS_COLOR);
    let right_middle = TextStyleBuilder::new()
        .alignment(Alignment::Right)
        .baseline(Baseline::Middle)
        .build();

    // Grid lines and level labels
    let rows = ((y1 - y0) / 40).max(2) as usize;
    let step = label_step(max_level - min_level, rows);
    for level in label_levels(min_level, max_level, step, rows + 1) {
        let y = level_to_y(level);
        Line::new(Point::new(x0, y), Point::new(x1, y))
            .into_styled(PrimitiveStyle::with_stroke(GRID_COLOR, 1))
            .draw(display)
            .ok();
        Text::with_text_style(
            &format_level(level, step),
            Point::new(x0 - 6, y),
            text_style,
            right_middle,
        )
        .draw(display)
        .ok();
    }

    // Axes
    let axis = PrimitiveStyle::with_stroke(AXIS_COLOR, 1);
    Line::new(Point::new(x0, y0), Point::new(x0, y1))
        .into_styled(axis)
        .draw(display)
        .ok();
    Line::new(Point::new(x0, y1), Point::new(x1, y1))
        .into_styled(axis)
        .draw(display)
        .ok();

    // Time labels under the axis
    let label_y = y1 + 14;
    let mid = first + (last - first) / 2;
    for (time, alignment, x) in [
        (first, Alignment::Left, x0),
        (mid, Alignment::Center, (x0 + x1) / 2),
        (last, Alignment::Right, x1),
    ] {
        let centered = alignment == Alignment::Center;
        // A single instant gets one centred label; narrow plots skip the middle one
        if (span <= 0.0 && !centered) || (span > 0.0 && centered && x1 - x0 < 320) {
            continue;
        }
        let style = TextStyleBuilder::new()
            .alignment(alignment)
            .baseline(Baseline::Middle)
            .build();
        Text::with_text_style(
            &time.format("%Y-%m-%d %H:%M").to_string(),
            Point::new(x, label_y),
            text_style,
            style,
        )
        .draw(display)
        .ok();
    }

    // Series
    for kind in [SeriesKind::Source, SeriesKind::Prediction] {
        let mut points: Vec<&LevelPoint> = table.series(kind).collect();
        points.sort_by_key(|p| p.time);
        let stroke = PrimitiveStyle::with_stroke(series_color(kind), 2);
        match points.as_slice() {
            [] => {}
            [only] => {
                let p = point_at(*only);
                Line::new(p - Point::new(2, 0), p + Point::new(2, 0))
                    .into_styled(stroke)
                    .draw(display)
                    .ok();
            }
            _ => {
                for pair in points.windows(2) {
                    Line::new(point_at(pair[0]), point_at(pair[1]))
                        .into_styled(stroke)
                        .draw(display)
                        .ok();
                }
            }
        }
    }

    // Legend
    let left_middle = TextStyleBuilder::new()
        .alignment(Alignment::Left)
        .baseline(Baseline::Middle)
        .build();
    let mut legend_x = x0;
    for kind in [SeriesKind::Source, SeriesKind::Prediction] {
        let y = TOP / 2;
        Line::new(Point::new(legend_x, y), Point::new(legend_x + 16, y))
            .into_styled(PrimitiveStyle::with_stroke(series_color(kind), 2))
            .draw(display)
            .ok();
        Text::with_text_style(kind.as_str(), Point::new(legend_x + 20, y), text_style, left_middle)
            .draw(display)
            .ok();
        legend_x += 20 + 6 * kind.as_str().len() as i32 + 16;
    }

    Ok(())
}

/// Render the dataset to a PPM file of the given size.
pub fn save_chart<P: AsRef<Path>>(
    table: &LevelTable,
    width: u32,
    height: u32,
    path: P,
) -> Result<(), ChartError> {
    if width > MAX_WIDTH || height > MAX_HEIGHT {
        return Err(ChartError::TooLarge { width, height });
    }
    let mut canvas = RasterCanvas::new(width, height);
    draw_chart(table, &mut canvas)?;
    canvas.save_ppm(path)
}
