//! Deferred Engine Work
//!
//! Player callbacks fire synchronously, often while the engine is in the
//! middle of a flush. Work that needs the engine state, and user listeners
//! that may call back into the engine, are queued here and drained once the
//! state is free again.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use log::trace;

pub enum Task<S> {
    /// Mutates the engine state.
    State(Box<dyn FnOnce(&mut S)>),
    /// Runs user code with no engine borrow held.
    Callback(Box<dyn FnOnce()>),
}

pub struct TaskQueue<S> {
    state: Weak<RefCell<S>>,
    tasks: Rc<RefCell<VecDeque<Task<S>>>>,
    draining: Rc<Cell<bool>>,
}

impl<S> Clone for TaskQueue<S> {
    fn clone(&self) -> Self {
        TaskQueue {
            state: self.state.clone(),
            tasks: self.tasks.clone(),
            draining: self.draining.clone(),
        }
    }
}

impl<S: 'static> TaskQueue<S> {
    pub fn new(state: Weak<RefCell<S>>) -> Self {
        TaskQueue {
            state,
            tasks: Rc::new(RefCell::new(VecDeque::new())),
            draining: Rc::new(Cell::new(false)),
        }
    }

    pub fn schedule_state(&self, task: impl FnOnce(&mut S) + 'static) {
        self.tasks.borrow_mut().push_back(Task::State(Box::new(task)));
        self.drain();
    }

    pub fn schedule_callback(&self, task: impl FnOnce() + 'static) {
        self.tasks.borrow_mut().push_back(Task::Callback(Box::new(task)));
        self.drain();
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }

    /// Runs queued tasks in order. Does nothing while the state is borrowed
    /// or another drain is already in progress; that owner picks the
    /// remaining tasks up.
    pub fn drain(&self) {
        if self.draining.get() {
            return;
        }
        let Some(state) = self.state.upgrade() else {
            self.tasks.borrow_mut().clear();
            return;
        };
        if state.try_borrow_mut().is_err() {
            return;
        }

        self.draining.set(true);
        let mut ran = 0usize;
        loop {
            let task = self.tasks.borrow_mut().pop_front();
            match task {
                None => break,
                Some(Task::Callback(callback)) => callback(),
                Some(Task::State(task)) => match state.try_borrow_mut() {
                    Ok(mut guard) => task(&mut *guard),
                    Err(_) => {
                        self.tasks.borrow_mut().push_front(Task::State(task));
                        break;
                    }
                },
            }
            ran += 1;
        }
        self.draining.set(false);
        if ran > 0 {
            trace!("drained {} deferred engine tasks", ran);
        }
    }
}
