// Interview block state machine with validation

use super::InterviewBlock;
use crate::error::EngineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlockTransitionError {
    #[error("Invalid block transition from {from} to {to}")]
    InvalidTransition {
        from: InterviewBlock,
        to: InterviewBlock,
    },

    #[error("Block {0} is the last block")]
    AlreadyTerminal(InterviewBlock),
}

impl From<BlockTransitionError> for EngineError {
    fn from(err: BlockTransitionError) -> Self {
        match err {
            BlockTransitionError::InvalidTransition { from, to } => {
                EngineError::InvalidTransition { from, to }
            }
            BlockTransitionError::AlreadyTerminal(block) => EngineError::InvalidTransition {
                from: block,
                to: block,
            },
        }
    }
}

/// Validates if the interview can move from one block to another.
/// Transitions are forward-only and never skip or repeat a block.
pub fn can_transition(from: InterviewBlock, to: InterviewBlock) -> bool {
    from.next() == Some(to)
}

/// Validates and performs a block transition
pub fn transition_block(
    current: InterviewBlock,
    target: InterviewBlock,
) -> Result<InterviewBlock, BlockTransitionError> {
    if is_last_block(current) && current == target {
        return Err(BlockTransitionError::AlreadyTerminal(current));
    }

    if !can_transition(current, target) {
        return Err(BlockTransitionError::InvalidTransition {
            from: current,
            to: target,
        });
    }

    Ok(target)
}

/// Check if a block is the final one before the terminal state
pub fn is_last_block(block: InterviewBlock) -> bool {
    block.next().is_none()
}

/// Blocks still ahead of the current one, in order
pub fn remaining_blocks(current: InterviewBlock) -> Vec<InterviewBlock> {
    InterviewBlock::all()
        .iter()
        .copied()
        .filter(|b| b.index() > current.index())
        .collect()
}
