//! Scoped capture and restore of renderer settings. A capture names the
//! settings it is about to mutate, runs, and gets every prior value written
//! back on success and on failure alike.

use crate::{
    error::{IsocapError, IsocapResult},
    scene::{ObjectId, Scene},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderSetting {
    ResolutionX,
    ResolutionY,
    ResolutionPercentage,
    FilmTransparent,
    UseBorder,
    UseCropToBorder,
    Border,
    UsePassZ,
    MaxBounces,
    FilterWidth,
    UseDenoising,
    UseAdaptiveSampling,
    Samples,
    FrameCurrent,
    ActiveCamera,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Rect(kurbo::Rect),
    Camera(Option<ObjectId>),
}

/// The sampler parameters overridden for depth capture.
pub const SAMPLER_SETTINGS: [RenderSetting; 5] = [
    RenderSetting::MaxBounces,
    RenderSetting::FilterWidth,
    RenderSetting::UseDenoising,
    RenderSetting::UseAdaptiveSampling,
    RenderSetting::Samples,
];

impl Scene {
    pub fn setting(&self, key: RenderSetting) -> SettingValue {
        match key {
            RenderSetting::ResolutionX => SettingValue::Int(self.render.resolution_x.into()),
            RenderSetting::ResolutionY => SettingValue::Int(self.render.resolution_y.into()),
            RenderSetting::ResolutionPercentage => {
                SettingValue::Int(self.render.resolution_percentage.into())
            }
            RenderSetting::FilmTransparent => SettingValue::Bool(self.render.film_transparent),
            RenderSetting::UseBorder => SettingValue::Bool(self.render.use_border),
            RenderSetting::UseCropToBorder => SettingValue::Bool(self.render.use_crop_to_border),
            RenderSetting::Border => SettingValue::Rect(self.render.border),
            RenderSetting::UsePassZ => SettingValue::Bool(self.render.use_pass_z),
            RenderSetting::MaxBounces => SettingValue::Int(self.sampler.max_bounces.into()),
            RenderSetting::FilterWidth => SettingValue::Float(self.sampler.filter_width),
            RenderSetting::UseDenoising => SettingValue::Bool(self.sampler.use_denoising),
            RenderSetting::UseAdaptiveSampling => {
                SettingValue::Bool(self.sampler.use_adaptive_sampling)
            }
            RenderSetting::Samples => SettingValue::Int(self.sampler.samples.into()),
            RenderSetting::FrameCurrent => SettingValue::Int(self.frame_current.into()),
            RenderSetting::ActiveCamera => SettingValue::Camera(self.active_camera),
        }
    }

    pub fn apply_setting(&mut self, key: RenderSetting, value: SettingValue) -> IsocapResult<()> {
        match (key, value) {
            (RenderSetting::ResolutionX, SettingValue::Int(v)) => {
                self.render.resolution_x = v as u32;
            }
            (RenderSetting::ResolutionY, SettingValue::Int(v)) => {
                self.render.resolution_y = v as u32;
            }
            (RenderSetting::ResolutionPercentage, SettingValue::Int(v)) => {
                self.render.resolution_percentage = v as u32;
            }
            (RenderSetting::FilmTransparent, SettingValue::Bool(v)) => {
                self.render.film_transparent = v;
            }
            (RenderSetting::UseBorder, SettingValue::Bool(v)) => self.render.use_border = v,
            (RenderSetting::UseCropToBorder, SettingValue::Bool(v)) => {
                self.render.use_crop_to_border = v;
            }
            (RenderSetting::Border, SettingValue::Rect(v)) => self.render.border = v,
            (RenderSetting::UsePassZ, SettingValue::Bool(v)) => self.render.use_pass_z = v,
            (RenderSetting::MaxBounces, SettingValue::Int(v)) => {
                self.sampler.max_bounces = v as u32;
            }
            (RenderSetting::FilterWidth, SettingValue::Float(v)) => self.sampler.filter_width = v,
            (RenderSetting::UseDenoising, SettingValue::Bool(v)) => self.sampler.use_denoising = v,
            (RenderSetting::UseAdaptiveSampling, SettingValue::Bool(v)) => {
                self.sampler.use_adaptive_sampling = v;
            }
            (RenderSetting::Samples, SettingValue::Int(v)) => self.sampler.samples = v as u32,
            (RenderSetting::FrameCurrent, SettingValue::Int(v)) => self.frame_current = v as i32,
            (RenderSetting::ActiveCamera, SettingValue::Camera(v)) => self.active_camera = v,
            (key, value) => {
                return Err(IsocapError::scene(format!(
                    "setting {key:?} cannot take value {value:?}"
                )));
            }
        }
        Ok(())
    }
}

/// Prior values of a named set of settings, captured before a mutation.
#[derive(Clone, Debug)]
pub struct SettingsSnapshot {
    saved: Vec<(RenderSetting, SettingValue)>,
}

impl SettingsSnapshot {
    pub fn capture(scene: &Scene, keys: &[RenderSetting]) -> Self {
        Self {
            saved: keys.iter().map(|&k| (k, scene.setting(k))).collect(),
        }
    }

    /// Writes the captured values back, in reverse capture order.
    pub fn restore(&self, scene: &mut Scene) -> IsocapResult<()> {
        for (key, value) in self.saved.iter().rev() {
            scene.apply_setting(*key, *value)?;
        }
        Ok(())
    }

    pub fn value(&self, key: RenderSetting) -> Option<SettingValue> {
        self.saved
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
    }
}

/// Runs `f` with the named settings snapshotted, restoring them on every
/// exit path. The closure's error wins over a restore error.
pub fn with_restored<T>(
    scene: &mut Scene,
    keys: &[RenderSetting],
    f: impl FnOnce(&mut Scene) -> IsocapResult<T>,
) -> IsocapResult<T> {
    let snapshot = SettingsSnapshot::capture(scene, keys);
    let result = f(scene);
    let restored = snapshot.restore(scene);
    let value = result?;
    restored?;
    Ok(value)
}
