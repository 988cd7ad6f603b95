//! Mass and spawn point descriptors, edited by the control thread and read by the simulation.

use crate::{geometry::Vector, Error};

// -------------------------------------------------------------------------------------------------

/// A force source which attracts particles inversely with squared distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MassPoint {
    pub position: Vector,
    /// Force multiplier in range \[1, 4\].
    pub mass_multiplier: f32,
}

impl MassPoint {
    pub const MIN_MASS_MULTIPLIER: f32 = 1.0;
    pub const MAX_MASS_MULTIPLIER: f32 = 4.0;

    /// Create a new mass point, clamping the multiplier into its valid range.
    pub fn new(position: Vector, mass_multiplier: f32) -> Self {
        let mass_multiplier = if mass_multiplier.is_finite() {
            mass_multiplier.clamp(Self::MIN_MASS_MULTIPLIER, Self::MAX_MASS_MULTIPLIER)
        } else {
            Self::MIN_MASS_MULTIPLIER
        };
        Self {
            position,
            mass_multiplier,
        }
    }
}

impl Default for MassPoint {
    fn default() -> Self {
        Self::new(Vector::new(200.0, 200.0), Self::MAX_MASS_MULTIPLIER)
    }
}

// -------------------------------------------------------------------------------------------------

/// An emission source: new particles start here, moving into the momentum angle's direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnPoint {
    pub position: Vector,
    /// Direction of the initial velocity in radians.
    pub momentum_angle: f32,
}

impl SpawnPoint {
    pub fn new(position: Vector, momentum_angle: f32) -> Self {
        let momentum_angle = if momentum_angle.is_finite() {
            momentum_angle
        } else {
            0.0
        };
        Self {
            position,
            momentum_angle,
        }
    }
}

impl Default for SpawnPoint {
    fn default() -> Self {
        Self::new(Vector::new(100.0, 300.0), 0.0)
    }
}

// -------------------------------------------------------------------------------------------------

/// The editable set of mass and spawn points.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    mass_points: Vec<MassPoint>,
    spawn_points: Vec<SpawnPoint>,
}

impl Default for Scene {
    /// A scene with one default mass and one default spawn point.
    fn default() -> Self {
        Self {
            mass_points: vec![MassPoint::default()],
            spawn_points: vec![SpawnPoint::default()],
        }
    }
}

impl Scene {
    pub const MAX_MASS_POINTS: usize = 16;
    pub const MAX_SPAWN_POINTS: usize = 8;

    /// Create a new scene without any points.
    pub fn empty() -> Self {
        Self {
            mass_points: Vec::with_capacity(Self::MAX_MASS_POINTS),
            spawn_points: Vec::with_capacity(Self::MAX_SPAWN_POINTS),
        }
    }

    /// Create a new scene from the given point lists. Excess points are dropped.
    pub fn with_points(mass_points: &[MassPoint], spawn_points: &[SpawnPoint]) -> Self {
        let mut scene = Self::empty();
        let mass_count = mass_points.len().min(Self::MAX_MASS_POINTS);
        let spawn_count = spawn_points.len().min(Self::MAX_SPAWN_POINTS);
        if mass_count < mass_points.len() || spawn_count < spawn_points.len() {
            log::warn!(
                "Dropping excess scene points: got {} mass and {} spawn points",
                mass_points.len(),
                spawn_points.len()
            );
        }
        scene.mass_points.extend(
            mass_points[..mass_count]
                .iter()
                .map(|p| MassPoint::new(p.position, p.mass_multiplier)),
        );
        scene.spawn_points.extend(
            spawn_points[..spawn_count]
                .iter()
                .map(|p| SpawnPoint::new(p.position, p.momentum_angle)),
        );
        scene
    }

    pub fn mass_points(&self) -> &[MassPoint] {
        &self.mass_points
    }

    pub fn spawn_points(&self) -> &[SpawnPoint] {
        &self.spawn_points
    }

    /// Add a new mass point and return its index.
    pub fn add_mass_point(&mut self, position: Vector, mass_multiplier: f32) -> Result<usize, Error> {
        if self.mass_points.len() >= Self::MAX_MASS_POINTS {
            return Err(Error::ParameterError(format!(
                "Maximum mass points reached ({})",
                Self::MAX_MASS_POINTS
            )));
        }
        self.mass_points
            .push(MassPoint::new(position, mass_multiplier));
        Ok(self.mass_points.len() - 1)
    }

    pub fn update_mass_point(
        &mut self,
        index: usize,
        position: Vector,
        mass_multiplier: f32,
    ) -> Result<(), Error> {
        let mass_point = self
            .mass_points
            .get_mut(index)
            .ok_or(Error::MassPointNotFound(index))?;
        *mass_point = MassPoint::new(position, mass_multiplier);
        Ok(())
    }

    pub fn remove_mass_point(&mut self, index: usize) -> Result<MassPoint, Error> {
        if index >= self.mass_points.len() {
            return Err(Error::MassPointNotFound(index));
        }
        Ok(self.mass_points.remove(index))
    }

    /// Add a new spawn point and return its index.
    pub fn add_spawn_point(&mut self, position: Vector, momentum_angle: f32) -> Result<usize, Error> {
        if self.spawn_points.len() >= Self::MAX_SPAWN_POINTS {
            return Err(Error::ParameterError(format!(
                "Maximum spawn points reached ({})",
                Self::MAX_SPAWN_POINTS
            )));
        }
        self.spawn_points
            .push(SpawnPoint::new(position, momentum_angle));
        Ok(self.spawn_points.len() - 1)
    }

    pub fn update_spawn_point(
        &mut self,
        index: usize,
        position: Vector,
        momentum_angle: f32,
    ) -> Result<(), Error> {
        let spawn_point = self
            .spawn_points
            .get_mut(index)
            .ok_or(Error::SpawnPointNotFound(index))?;
        *spawn_point = SpawnPoint::new(position, momentum_angle);
        Ok(())
    }

    pub fn remove_spawn_point(&mut self, index: usize) -> Result<SpawnPoint, Error> {
        if index >= self.spawn_points.len() {
            return Err(Error::SpawnPointNotFound(index));
        }
        Ok(self.spawn_points.remove(index))
    }

    /// Copy all points into the given scene without reallocating, as long as the target has
    /// enough capacity. Used by the audio thread to take its block start snapshot.
    pub(crate) fn copy_into(&self, target: &mut Scene) {
        target.mass_points.clear();
        target.mass_points.extend_from_slice(&self.mass_points);
        target.spawn_points.clear();
        target.spawn_points.extend_from_slice(&self.spawn_points);
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_scene() {
        let scene = Scene::default();
        assert_eq!(scene.mass_points(), &[MassPoint::default()]);
        assert_eq!(scene.mass_points()[0].mass_multiplier, 4.0);
        assert_eq!(scene.spawn_points()[0].position, Vector::new(100.0, 300.0));
    }

    #[test]
    fn edit_points() -> Result<(), Box<dyn std::error::Error>> {
        let mut scene = Scene::empty();
        let index = scene.add_mass_point(Vector::new(1.0, 2.0), 10.0)?;
        assert_eq!(index, 0);
        // multiplier gets clamped
        assert_eq!(scene.mass_points()[0].mass_multiplier, 4.0);

        scene.update_mass_point(0, Vector::new(5.0, 5.0), 0.5)?;
        assert_eq!(
            scene.mass_points()[0],
            MassPoint::new(Vector::new(5.0, 5.0), 1.0)
        );
        assert!(matches!(
            scene.update_mass_point(3, Vector::ZERO, 1.0),
            Err(Error::MassPointNotFound(3))
        ));
        scene.remove_mass_point(0)?;
        assert!(scene.mass_points().is_empty());
        assert!(scene.remove_mass_point(0).is_err());

        scene.add_spawn_point(Vector::new(1.0, 1.0), f32::NAN)?;
        assert_eq!(scene.spawn_points()[0].momentum_angle, 0.0);
        scene.update_spawn_point(0, Vector::new(2.0, 2.0), 1.5)?;
        assert_eq!(scene.spawn_points()[0].momentum_angle, 1.5);
        assert!(matches!(
            scene.remove_spawn_point(1),
            Err(Error::SpawnPointNotFound(1))
        ));
        Ok(())
    }

    #[test]
    fn point_limits() {
        let mut scene = Scene::empty();
        for _ in 0..Scene::MAX_SPAWN_POINTS {
            assert!(scene.add_spawn_point(Vector::ZERO, 0.0).is_ok());
        }
        assert!(scene.add_spawn_point(Vector::ZERO, 0.0).is_err());
        for _ in 0..Scene::MAX_MASS_POINTS {
            assert!(scene.add_mass_point(Vector::ZERO, 1.0).is_ok());
        }
        assert!(scene.add_mass_point(Vector::ZERO, 1.0).is_err());

        let too_many = vec![MassPoint::default(); Scene::MAX_MASS_POINTS + 4];
        let scene = Scene::with_points(&too_many, &[]);
        assert_eq!(scene.mass_points().len(), Scene::MAX_MASS_POINTS);
    }
}
