//! Dispatch sizing for the 2D grid kernels.
//!
//! Backends that can launch an exact thread grid get the extent as-is.
//! Backends that only launch whole thread groups get `ceil(extent / group)`
//! groups per axis; the surplus threads fall outside the grid and are
//! discarded by the kernels' bounds checks.

use crate::params::ThreadGroupExtent;

/// 2D work extent in threads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridExtent {
    pub width: u32,
    pub height: u32,
}

impl GridExtent {
    pub fn square(side: u32) -> Self {
        Self {
            width: side,
            height: side,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// How a kernel launch is shaped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Exact per-thread grid (non-uniform thread groups)
    Threads {
        extent: GridExtent,
        group: ThreadGroupExtent,
    },
    /// Whole thread groups; covers at least the requested extent
    Groups {
        count: GridExtent,
        group: ThreadGroupExtent,
    },
}

impl Dispatch {
    /// Threads the backend will actually launch
    pub fn thread_extent(&self) -> GridExtent {
        match *self {
            Self::Threads { extent, .. } => extent,
            Self::Groups { count, group } => GridExtent {
                width: count.width * group.width,
                height: count.height * group.height,
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Threads { extent, .. } => extent.is_empty(),
            Self::Groups { count, .. } => count.is_empty(),
        }
    }
}

/// Computes launch shapes for vertex and index kernels
#[derive(Debug, Clone, Copy)]
pub struct DispatchPlanner {
    group: ThreadGroupExtent,
    uniform_groups_only: bool,
}

impl DispatchPlanner {
    /// `uniform_groups_only` is true when the backend cannot launch partial thread groups.
    pub fn new(group: ThreadGroupExtent, uniform_groups_only: bool) -> Self {
        Self {
            group,
            uniform_groups_only,
        }
    }

    /// Launch shape covering `extent`
    pub fn plan(&self, extent: GridExtent) -> Dispatch {
        if self.uniform_groups_only {
            Dispatch::Groups {
                count: GridExtent {
                    width: extent.width.div_ceil(self.group.width),
                    height: extent.height.div_ceil(self.group.height),
                },
                group: self.group,
            }
        } else {
            Dispatch::Threads {
                extent,
                group: self.group,
            }
        }
    }

    /// One thread per vertex: `(n + 1)` per axis
    pub fn vertex_dispatch(&self, segment_count: u32) -> Dispatch {
        self.plan(GridExtent::square(segment_count + 1))
    }

    /// One thread per quad: `n` per axis (empty when `n == 0`)
    pub fn index_dispatch(&self, segment_count: u32) -> Dispatch {
        self.plan(GridExtent::square(segment_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_counts_round_up() {
        let planner = DispatchPlanner::new(ThreadGroupExtent::DEFAULT, true);

        let dispatch = planner.vertex_dispatch(64);
        assert_eq!(
            dispatch,
            Dispatch::Groups {
                count: GridExtent::square(9),
                group: ThreadGroupExtent::DEFAULT,
            }
        );
        assert_eq!(dispatch.thread_extent(), GridExtent::square(72));

        // 64 divides evenly
        assert_eq!(
            planner.index_dispatch(64),
            Dispatch::Groups {
                count: GridExtent::square(8),
                group: ThreadGroupExtent::DEFAULT,
            }
        );
    }

    #[test]
    fn test_exact_threads_when_supported() {
        let planner = DispatchPlanner::new(ThreadGroupExtent::DEFAULT, false);

        let dispatch = planner.vertex_dispatch(64);
        assert_eq!(dispatch.thread_extent(), GridExtent::square(65));
        assert!(matches!(dispatch, Dispatch::Threads { .. }));
    }

    #[test]
    fn test_zero_segments_empty_index_dispatch() {
        for uniform in [true, false] {
            let planner = DispatchPlanner::new(ThreadGroupExtent::DEFAULT, uniform);

            assert!(planner.index_dispatch(0).is_empty());
            assert!(!planner.vertex_dispatch(0).is_empty());
        }
    }

    #[test]
    fn test_non_square_groups() {
        let group = ThreadGroupExtent {
            width: 16,
            height: 4,
        };
        let planner = DispatchPlanner::new(group, true);

        let dispatch = planner.plan(GridExtent {
            width: 17,
            height: 9,
        });
        assert_eq!(
            dispatch,
            Dispatch::Groups {
                count: GridExtent {
                    width: 2,
                    height: 3
                },
                group,
            }
        );
    }
}
