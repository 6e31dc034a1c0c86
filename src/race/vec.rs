use super::Race as RaceTrait;
use crate::{Deferred, Resolution};

impl<T: Clone + 'static> RaceTrait for Vec<Resolution<T>> {
    type Output = T;

    fn race(self) -> Deferred<Self::Output> {
        super::race(self)
    }
}
