//! Per-frame bookkeeping of which targets have been produced.
//!
//! Passes run in a fixed order: geometry, lighting, shadow, reflection. Each
//! reads targets an earlier pass wrote in the same frame. [`FrameState`]
//! records what has been written since the last [`FrameState::begin`] so the
//! pipeline can refuse a stage whose inputs are stale.

/// A stage of the per-frame pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    Geometry,
    Lighting,
    Shadow,
    Reflection,
    Raycast,
    Present,
}

/// A target written by exactly one stage per frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TargetId {
    GBuffer,
    Lit,
    Shadow,
    Reflection,
    Presentation,
}

impl TargetId {
    const COUNT: usize = 5;

    fn index(self) -> usize {
        self as usize
    }

    /// Targets computed from this one, which a rewrite leaves stale.
    fn dependents(self) -> &'static [TargetId] {
        match self {
            TargetId::GBuffer => &[TargetId::Lit, TargetId::Shadow, TargetId::Reflection],
            TargetId::Lit => &[TargetId::Shadow, TargetId::Reflection],
            TargetId::Shadow | TargetId::Reflection | TargetId::Presentation => &[],
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Contents {
    /// Left over from an earlier frame, or freshly allocated.
    #[default]
    Stale,
    /// Cleared this frame but not yet drawn into.
    Cleared,
    /// Written by its stage this frame.
    Written,
}

/// What the current frame has produced so far.
#[derive(Clone, Debug, Default)]
pub struct FrameState {
    frame: u64,
    targets: [Contents; TargetId::COUNT],
    presented_by: Option<Stage>,
}

impl FrameState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new frame with a freshly cleared G-buffer.
    pub fn begin(&mut self) {
        self.frame += 1;
        self.targets = [Contents::Stale; TargetId::COUNT];
        self.targets[TargetId::GBuffer.index()] = Contents::Cleared;
        self.presented_by = None;
    }

    /// Forgets everything. Used after targets are reallocated.
    pub fn invalidate(&mut self) {
        self.targets = [Contents::Stale; TargetId::COUNT];
        self.presented_by = None;
    }

    /// Number of frames begun so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Whether `target` holds this frame's output.
    pub fn is_written(&self, target: TargetId) -> bool {
        self.targets[target.index()] == Contents::Written
    }

    /// Checks that every input of `stage` is ready.
    ///
    /// Returns the first missing input. Geometry only needs a cleared
    /// G-buffer; every later stage needs the G-buffer fully written.
    pub fn check(&self, stage: Stage) -> Option<TargetId> {
        let gbuffer = self.targets[TargetId::GBuffer.index()];
        match stage {
            Stage::Geometry => (gbuffer == Contents::Stale).then_some(TargetId::GBuffer),
            Stage::Lighting => (gbuffer != Contents::Written).then_some(TargetId::GBuffer),
            Stage::Shadow | Stage::Reflection => {
                if gbuffer != Contents::Written {
                    Some(TargetId::GBuffer)
                } else if !self.is_written(TargetId::Lit) {
                    Some(TargetId::Lit)
                } else {
                    None
                }
            }
            Stage::Raycast | Stage::Present => None,
        }
    }

    /// Records that `stage` produced its output.
    ///
    /// Targets derived from that output go back to stale, so a stage re-run
    /// mid-frame forces its consumers to run again before they can be read.
    pub fn complete(&mut self, stage: Stage) {
        let target = match stage {
            Stage::Geometry => TargetId::GBuffer,
            Stage::Lighting => TargetId::Lit,
            Stage::Shadow => TargetId::Shadow,
            Stage::Reflection => TargetId::Reflection,
            Stage::Raycast | Stage::Present => TargetId::Presentation,
        };
        self.targets[target.index()] = Contents::Written;
        for dependent in target.dependents() {
            self.targets[dependent.index()] = Contents::Stale;
        }
    }

    /// Records a write to the presentation surface.
    ///
    /// Returns the stage that wrote it earlier this frame, if a different one
    /// did. The later submission wins on the queue.
    pub fn claim_presentation(&mut self, stage: Stage) -> Option<Stage> {
        let previous = self.presented_by.replace(stage);
        previous.filter(|&p| p != stage)
    }

    /// Marks the presentation surface as cleared.
    pub fn clear_presentation(&mut self) {
        self.presented_by = None;
        self.targets[TargetId::Presentation.index()] = Contents::Cleared;
    }
}
