/// A named capability tier requested from the adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureLevel {
    pub name: &'static str,
    pub features: wgpu::Features,
}

impl FeatureLevel {
    pub const fn new(name: &'static str, features: wgpu::Features) -> Self {
        Self { name, features }
    }

    /// Default preference list, best first.
    ///
    /// BGRA storage lets the compute stage write swap chains that only offer
    /// BGRA formats (common on Windows and macOS).
    pub fn defaults() -> Vec<FeatureLevel> {
        vec![
            FeatureLevel::new("bgra8-storage", wgpu::Features::BGRA8UNORM_STORAGE),
            FeatureLevel::new("baseline", wgpu::Features::empty()),
        ]
    }
}

/// Initialization parameters for the render context.
///
/// Fixed at startup; nothing here is re-evaluated per frame.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Present on vertical blank (FIFO). When `false`, an immediate (tearing)
    /// or mailbox mode is used if the surface offers one.
    pub wait_for_vsync: bool,

    /// Feature levels to try, most preferred first. The first one the adapter
    /// supports wins.
    pub feature_levels: Vec<FeatureLevel>,

    pub power_preference: wgpu::PowerPreference,

    /// Limits requested from the adapter/device.
    pub required_limits: wgpu::Limits,

    /// Desired maximum frame latency for the surface.
    ///
    /// This value is a hint; support depends on platform/backend.
    pub desired_maximum_frame_latency: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            wait_for_vsync: true,
            feature_levels: FeatureLevel::defaults(),
            power_preference: wgpu::PowerPreference::HighPerformance,
            required_limits: wgpu::Limits::default(),
            // Double-buffered swap chain.
            desired_maximum_frame_latency: 2,
        }
    }
}
