/// Radius of the orbit the camera travels on, looking at the sphere center.
const DISTANCE: f64 = 50.0;
/// Degrees of rotation per pixel of pointer travel.
const SENSITIVITY: f64 = 0.1;
const MAX_LATITUDE: f64 = 85.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct DragOrigin {
    pointer_x: f64,
    pointer_y: f64,
    lon: f64,
    lat: f64,
}

/// Drag-to-look state of one 360° surface. Each surface owns its own camera,
/// so concurrent 360° sessions never share an orientation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrbitCamera {
    lon: f64,
    lat: f64,
    drag: Option<DragOrigin>,
}

impl OrbitCamera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn pointer_down(&mut self, x: f64, y: f64) {
        self.drag = Some(DragOrigin {
            pointer_x: x,
            pointer_y: y,
            lon: self.lon,
            lat: self.lat,
        });
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) {
        if let Some(origin) = self.drag {
            self.lon = (origin.pointer_x - x) * SENSITIVITY + origin.lon;
            self.lat = ((origin.pointer_y - y) * SENSITIVITY + origin.lat).clamp(-MAX_LATITUDE, MAX_LATITUDE);
        }
    }

    pub fn pointer_up(&mut self) {
        self.drag = None;
    }

    pub fn position(&self) -> CameraPosition {
        let phi = (90.0 - self.lat).to_radians();
        let theta = self.lon.to_radians();
        CameraPosition {
            x: DISTANCE * phi.sin() * theta.cos(),
            y: DISTANCE * phi.cos(),
            z: DISTANCE * phi.sin() * theta.sin(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_drag_rotates_only_while_pressed() {
        let mut camera = OrbitCamera::new();
        camera.pointer_move(500.0, 500.0);
        assert_eq!(camera.lon(), 0.0);

        camera.pointer_down(100.0, 100.0);
        camera.pointer_move(0.0, 50.0);
        assert!(close(camera.lon(), 10.0));
        assert!(close(camera.lat(), 5.0));

        camera.pointer_up();
        camera.pointer_move(1000.0, 1000.0);
        assert!(close(camera.lon(), 10.0));

        // a second drag continues from the current orientation
        camera.pointer_down(0.0, 0.0);
        camera.pointer_move(-100.0, 0.0);
        assert!(close(camera.lon(), 20.0));
    }

    #[test]
    fn test_latitude_is_clamped() {
        let mut camera = OrbitCamera::new();
        camera.pointer_down(0.0, 0.0);
        camera.pointer_move(0.0, -5000.0);
        assert_eq!(camera.lat(), 85.0);
        camera.pointer_move(0.0, 5000.0);
        assert_eq!(camera.lat(), -85.0);
    }

    #[test]
    fn test_instances_are_independent() {
        let mut left = OrbitCamera::new();
        let right = OrbitCamera::new();
        left.pointer_down(0.0, 0.0);
        left.pointer_move(-300.0, 0.0);
        assert!(!right.is_dragging());
        assert_eq!(right.lon(), 0.0);
        assert_ne!(left.position(), right.position());
    }

    #[test]
    fn test_position_on_orbit() {
        let camera = OrbitCamera::new();
        let position = camera.position();
        assert!(close(position.x, 50.0));
        assert!(close(position.y, 0.0));
        assert!(close(position.z, 0.0));
    }
}
