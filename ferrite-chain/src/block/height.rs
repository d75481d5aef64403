use serde::{Deserialize, Serialize};

/// The height of a block in its chain: the genesis block is at height 0,
/// and every other block is one higher than its parent.
#[derive(
    Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
pub struct Height(pub u32);

impl Height {
    /// The height of the genesis block.
    pub const MIN: Height = Height(0);

    /// The largest representable height.
    pub const MAX: Height = Height(u32::MAX - 1);

    /// The height of a child of a block at this height.
    pub fn next(self) -> Height {
        assert!(self < Height::MAX, "height overflow");
        Height(self.0 + 1)
    }
}
