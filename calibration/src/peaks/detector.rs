use super::Real;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub position: Real,
    pub height: Real,
}

pub trait Detector: Clone {
    type EventType;

    fn signal(&mut self, position: Real, value: Real) -> Option<Self::EventType>;
}

/// Reports each strict local maximum. A flat top is reported at its first
/// point, and a maximum at either end of the stream is not reported.
#[derive(Default, Clone)]
pub struct LocalMaximumDetector {
    previous: Option<Real>,
    candidate: Option<Candidate>,
}

impl Detector for LocalMaximumDetector {
    type EventType = Candidate;

    fn signal(&mut self, position: Real, value: Real) -> Option<Candidate> {
        let previous = self.previous.replace(value)?;
        if value > previous {
            self.candidate = Some(Candidate {
                position,
                height: value,
            });
            None
        } else if value < previous {
            self.candidate.take()
        } else {
            None
        }
    }
}

#[derive(Clone)]
pub struct EventIter<I, D> {
    source: I,
    detector: D,
}

impl<I, D> Iterator for EventIter<I, D>
where
    I: Iterator<Item = (Real, Real)>,
    D: Detector,
{
    type Item = D::EventType;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (position, value) = self.source.next()?;
            if let Some(event) = self.detector.signal(position, value) {
                return Some(event);
            }
        }
    }
}

pub trait EventFilter<I, D>
where
    I: Iterator<Item = (Real, Real)>,
    D: Detector,
{
    fn events(self, detector: D) -> EventIter<I, D>;
}

impl<I, D> EventFilter<I, D> for I
where
    I: Iterator<Item = (Real, Real)>,
    D: Detector,
{
    fn events(self, detector: D) -> EventIter<I, D> {
        EventIter {
            source: self,
            detector,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn maxima(values: &[Real]) -> Vec<Candidate> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| (i as Real, v))
            .events(LocalMaximumDetector::default())
            .collect()
    }

    #[test]
    fn finds_interior_maxima() {
        let found = maxima(&[0.0, 1.0, 3.0, 2.0, 2.0, 5.0, 1.0]);
        assert_eq!(
            found,
            vec![
                Candidate {
                    position: 2.0,
                    height: 3.0
                },
                Candidate {
                    position: 5.0,
                    height: 5.0
                }
            ]
        );
    }

    #[test]
    fn edges_are_not_maxima() {
        assert!(maxima(&[5.0, 4.0, 3.0]).is_empty());
        assert!(maxima(&[1.0, 2.0, 3.0]).is_empty());
    }

    #[test]
    fn flat_top_reports_first_point() {
        let found = maxima(&[0.0, 2.0, 2.0, 2.0, 0.0]);
        assert_eq!(found.len(), 1);
        assert_eq!(found.first().map(|c| c.position), Some(1.0));
    }
}
