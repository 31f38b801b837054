use super::Real;
use std::collections::VecDeque;

pub trait Window: Clone {
    type InputType: Copy;
    type OutputType;

    fn push(&mut self, value: Self::InputType) -> bool;
    fn output(&self) -> Option<Self::OutputType>;
    fn apply_shift(&self, position: Real) -> Real;
}

#[derive(Clone)]
pub struct WindowIter<I, W>
where
    I: Iterator,
    W: Window,
{
    window_function: W,
    source: I,
}

impl<I, W> Iterator for WindowIter<I, W>
where
    I: Iterator<Item = (Real, W::InputType)>,
    W: Window,
{
    type Item = (Real, W::OutputType);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (position, value) = self.source.next()?;
            if self.window_function.push(value) {
                return Some((
                    self.window_function.apply_shift(position),
                    self.window_function.output()?,
                ));
            }
        }
    }
}

pub trait WindowFilter<I, W>
where
    I: Iterator,
    W: Window,
{
    fn window(self, window: W) -> WindowIter<I, W>;
}

impl<I, W> WindowFilter<I, W> for I
where
    I: Iterator<Item = (Real, W::InputType)>,
    W: Window,
{
    fn window(self, window_function: W) -> WindowIter<I, W> {
        WindowIter {
            window_function,
            source: self,
        }
    }
}

/// Gaussian-weighted moving average over `±3σ`, reported at the centre of
/// the window.
#[derive(Clone)]
pub struct GaussianSmoothing {
    kernel: Vec<Real>,
    values: VecDeque<Real>,
    step: Real,
}

impl GaussianSmoothing {
    /// `sigma` is in points and `step` is the spacing between points.
    pub fn new(sigma: Real, step: Real) -> Self {
        let half = if sigma > 0.0 {
            (3.0 * sigma).ceil() as i32
        } else {
            0
        };
        let kernel: Vec<Real> = (-half..=half)
            .map(|k| {
                if sigma > 0.0 {
                    (-0.5 * (Real::from(k) / sigma).powi(2)).exp()
                } else {
                    1.0
                }
            })
            .collect();
        let norm: Real = kernel.iter().sum();
        Self {
            kernel: kernel.into_iter().map(|w| w / norm).collect(),
            values: VecDeque::new(),
            step,
        }
    }

    fn half_width(&self) -> usize {
        self.kernel.len() / 2
    }
}

impl Window for GaussianSmoothing {
    type InputType = Real;
    type OutputType = Real;

    fn push(&mut self, value: Real) -> bool {
        self.values.push_back(value);
        if self.values.len() > self.kernel.len() {
            self.values.pop_front();
        }
        self.values.len() == self.kernel.len()
    }

    fn output(&self) -> Option<Real> {
        (self.values.len() == self.kernel.len()).then(|| {
            self.kernel
                .iter()
                .zip(&self.values)
                .map(|(w, v)| w * v)
                .sum()
        })
    }

    fn apply_shift(&self, position: Real) -> Real {
        position - self.half_width() as Real * self.step
    }
}
