use super::Serially as SeriallyTrait;
use crate::{Deferred, Resolution};

impl<T: Clone + 'static> SeriallyTrait for Vec<Resolution<T>> {
    type Output = T;

    fn run_serially<F>(self, observer: F) -> Deferred<Vec<Self::Output>>
    where
        F: FnMut(Self::Output) + 'static,
    {
        super::run_serially(self, observer)
    }
}
