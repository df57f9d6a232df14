// perch_sim/src/simulation/world/environment.rs

use image::imageops::{self, FilterType};
use image::GrayImage;
use perch_core::abstractions::{FrameProvider, LandmarkOracle};
use perch_core::error::{PerchError, Result};
use perch_core::types::Position2D;
use std::path::Path;
use tracing::info;

use crate::error::SimError;

/// Altitude below which the view stops narrowing.
const MIN_VIEW_ALTITUDE: f64 = 10.0;
/// Altitude at which the view matches the camera resolution 1:1.
const UNIT_ZOOM_ALTITUDE: f64 = 100.0;
const MIN_ZOOM: f64 = 0.1;
const MAX_ZOOM: f64 = 2.0;

/// The landmark image and where it lies on the map.
#[derive(Debug, Clone)]
pub struct PlacedLandmark {
    /// The reference image at its own resolution; frames resample it once.
    pub image: GrayImage,
    /// Centre of the landmark in map pixels.
    pub position: Position2D,
    /// Footprint on the map in pixels.
    pub size: (u32, u32),
}

/// The patch of map a camera sees, in map pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewRect {
    pub x: f64,
    pub y: f64,
    pub width: u32,
    pub height: u32,
}

impl ViewRect {
    /// Edges are inclusive.
    pub fn contains(&self, point: &Position2D) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width as f64
            && point.y >= self.y
            && point.y <= self.y + self.height as f64
    }
}

/// The map raster plus the optional landmark. Serves camera frames and
/// ground-truth landmark positions to the mission.
#[derive(Debug, Clone)]
pub struct Environment {
    map: GrayImage,
    landmark: Option<PlacedLandmark>,
}

impl Environment {
    pub fn new(map: GrayImage) -> Self {
        info!("Map ready: {}x{} pixels", map.width(), map.height());
        Self {
            map,
            landmark: None,
        }
    }

    /// Loads a map image from disk and converts it to grayscale.
    pub fn from_file(path: &Path) -> std::result::Result<Self, SimError> {
        let map = load_gray(path)?;
        Ok(Self::new(map))
    }

    pub fn map(&self) -> &GrayImage {
        &self.map
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.map.dimensions()
    }

    /// Places the landmark centred at `position`, covering `size` map pixels.
    ///
    /// The image is kept at full resolution and only resampled when a frame
    /// is rendered.
    pub fn place_landmark(
        &mut self,
        image: GrayImage,
        position: Position2D,
        size: (u32, u32),
    ) -> Result<()> {
        let (width, height) = self.dimensions();
        if !self.contains(&position) {
            return Err(PerchError::Configuration(format!(
                "landmark position ({:.1}, {:.1}) lies outside the {}x{} map",
                position.x, position.y, width, height
            )));
        }
        if size.0 == 0 || size.1 == 0 {
            return Err(PerchError::Configuration(
                "landmark footprint must be non-empty".to_string(),
            ));
        }
        info!(
            "Landmark placed at ({:.1}, {:.1}) with footprint {}x{}",
            position.x, position.y, size.0, size.1
        );
        self.landmark = Some(PlacedLandmark {
            image,
            position,
            size,
        });
        Ok(())
    }

    pub fn place_landmark_at_center(&mut self, image: GrayImage, size: (u32, u32)) -> Result<()> {
        let center = Position2D::new((self.map.width() / 2) as f64, (self.map.height() / 2) as f64);
        self.place_landmark(image, center, size)
    }

    pub fn landmark(&self) -> Option<&PlacedLandmark> {
        self.landmark.as_ref()
    }

    fn contains(&self, position: &Position2D) -> bool {
        let (width, height) = self.dimensions();
        (0.0..=width as f64).contains(&position.x) && (0.0..=height as f64).contains(&position.y)
    }

    /// The map patch under the drone.
    ///
    /// The view widens with altitude: `camera * clamp(altitude / 100, 0.1, 2.0)`,
    /// with altitude floored at 10. It is centred on the drone and shifted to
    /// stay inside the map. Fails if the drone is off the map or the view does
    /// not fit.
    pub fn view_rect(
        &self,
        position: &Position2D,
        camera_size: (u32, u32),
        altitude: f64,
    ) -> Result<ViewRect> {
        let (map_width, map_height) = self.dimensions();
        let zoom = (altitude.max(MIN_VIEW_ALTITUDE) / UNIT_ZOOM_ALTITUDE).clamp(MIN_ZOOM, MAX_ZOOM);
        let width = ((camera_size.0 as f64 * zoom).round() as u32).max(1);
        let height = ((camera_size.1 as f64 * zoom).round() as u32).max(1);

        if !self.contains(position) || width > map_width || height > map_height {
            return Err(PerchError::OutOfBounds {
                x: position.x,
                y: position.y,
                view_width: width,
                view_height: height,
                map_width,
                map_height,
            });
        }

        let x = (position.x - (width / 2) as f64)
            .floor()
            .clamp(0.0, (map_width - width) as f64);
        let y = (position.y - (height / 2) as f64)
            .floor()
            .clamp(0.0, (map_height - height) as f64);
        Ok(ViewRect {
            x,
            y,
            width,
            height,
        })
    }

    /// Renders the camera frame: crops the view, resamples it to the camera
    /// resolution and composites the landmark when it is inside the view.
    pub fn camera_view(
        &self,
        position: &Position2D,
        camera_size: (u32, u32),
        altitude: f64,
    ) -> Result<GrayImage> {
        let view = self.view_rect(position, camera_size, altitude)?;
        let cropped =
            imageops::crop_imm(&self.map, view.x as u32, view.y as u32, view.width, view.height)
                .to_image();
        let mut frame = imageops::resize(&cropped, camera_size.0, camera_size.1, FilterType::Triangle);

        if let Some(landmark) = self.landmark.as_ref().filter(|l| view.contains(&l.position)) {
            let scale_x = camera_size.0 as f64 / view.width as f64;
            let scale_y = camera_size.1 as f64 / view.height as f64;
            let cam_x = ((landmark.position.x - view.x) * scale_x) as i64;
            let cam_y = ((landmark.position.y - view.y) * scale_y) as i64;
            let width = ((landmark.size.0 as f64 * scale_x) as u32).max(1);
            let height = ((landmark.size.1 as f64 * scale_y) as u32).max(1);
            let scaled = imageops::resize(&landmark.image, width, height, FilterType::Triangle);
            imageops::overlay(
                &mut frame,
                &scaled,
                cam_x - (width / 2) as i64,
                cam_y - (height / 2) as i64,
            );
        }
        Ok(frame)
    }

    /// True if the landmark centre lies inside the camera view.
    pub fn is_landmark_visible(
        &self,
        position: &Position2D,
        camera_size: (u32, u32),
        altitude: f64,
    ) -> bool {
        match (&self.landmark, self.view_rect(position, camera_size, altitude)) {
            (Some(landmark), Ok(view)) => view.contains(&landmark.position),
            _ => false,
        }
    }
}

impl FrameProvider for Environment {
    fn get_frame(
        &self,
        position: &Position2D,
        size: (u32, u32),
        altitude: f64,
    ) -> Result<GrayImage> {
        self.camera_view(position, size, altitude)
    }
}

impl LandmarkOracle for Environment {
    fn landmark_position(&self) -> Option<Position2D> {
        self.landmark.as_ref().map(|l| l.position)
    }
}

/// Opens any format the `image` crate can decode and converts it to 8-bit grayscale.
pub fn load_gray(path: &Path) -> std::result::Result<GrayImage, SimError> {
    image::open(path)
        .map(|img| img.to_luma8())
        .map_err(|source| SimError::Image {
            path: path.to_path_buf(),
            source,
        })
}
