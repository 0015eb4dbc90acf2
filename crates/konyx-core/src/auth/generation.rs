//! Generation counter for session verification.
//!
//! Each startup verification is issued a fresh generation. Its verdict is
//! applied only while that generation is still current, so a token set
//! explicitly while the request was in flight is never overwritten.

/// Generation number carried by one verification request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation(u64);

/// The outstanding verification, if any.
#[derive(Debug, Default)]
pub struct VerificationGate {
    issued: u64,
    current: Option<Generation>,
}

impl VerificationGate {
    /// Issues a generation for a new verification; older ones go stale.
    pub fn issue(&mut self) -> Generation {
        let generation = Generation(self.issued);
        self.issued += 1;
        self.current = Some(generation);
        generation
    }

    /// Makes the outstanding verification stale.
    pub fn retire(&mut self) {
        self.current = None;
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.current == Some(generation)
    }

    /// Claims the verdict slot for `generation`. False when it went stale.
    pub fn settle(&mut self, generation: Generation) -> bool {
        let current = self.is_current(generation);
        if current {
            self.current = None;
        }
        current
    }
}
