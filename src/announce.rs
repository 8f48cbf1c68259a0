//! Distance-gated voice announcements.
//!
//! Each step has a fixed set of announcement distances (buckets). A
//! bucket fires once, the first time the distance to the maneuver drops
//! below it. When a sample skips past several buckets at once they all
//! fire, largest first.

/// Per-step announcement state.
#[derive(Debug, Clone)]
pub struct AnnouncementScheduler {
    /// Strictly descending, in meters.
    buckets: Vec<u32>,
    last_announced: Option<u32>,
    /// False until the first distance of the step has been seen.
    primed: bool,
}

impl AnnouncementScheduler {
    pub fn new(buckets: Vec<u32>) -> Self {
        Self {
            buckets,
            last_announced: None,
            primed: false,
        }
    }

    /// Reset for a newly current step.
    ///
    /// The step's bare instruction has just been spoken, so buckets the
    /// vehicle is already inside count as announced. With no distance known
    /// yet, that decision is deferred to the first call to [`check`].
    ///
    /// [`check`]: AnnouncementScheduler::check
    pub fn start_step(&mut self, distance_to_maneuver: Option<f64>) {
        self.last_announced = None;
        self.primed = false;
        if let Some(d) = distance_to_maneuver {
            self.prime(d);
        }
    }

    /// Buckets to announce for this distance, in descending order.
    pub fn check(&mut self, distance_to_maneuver: f64) -> Vec<u32> {
        if !self.primed {
            self.prime(distance_to_maneuver);
            return Vec::new();
        }

        let mut fired = Vec::new();
        for &bucket in &self.buckets {
            if distance_to_maneuver >= f64::from(bucket) {
                continue;
            }
            if self.last_announced.is_some_and(|last| bucket >= last) {
                continue;
            }
            self.last_announced = Some(bucket);
            fired.push(bucket);
        }
        fired
    }

    pub fn last_announced(&self) -> Option<u32> {
        self.last_announced
    }

    fn prime(&mut self, distance_to_maneuver: f64) {
        self.primed = true;
        self.last_announced = self
            .buckets
            .iter()
            .copied()
            .filter(|&b| distance_to_maneuver < f64::from(b))
            .min();
    }
}

/// Text spoken when a bucket fires.
pub fn distance_prompt(bucket_m: u32, instruction: &str) -> String {
    format!("In {bucket_m} meters, {instruction}")
}
