//! ABI bindings for the contracts this client talks to.
//!
//! Only the interface is consumed; the escrow contract itself is deployed and
//! maintained elsewhere.

use alloy::sol;

sol! {
    /// A swap proposal stored by the escrow contract.
    #[derive(Debug, PartialEq, Eq)]
    struct EscrowOperation {
        uint256 id;
        address user1;
        address tokenA;
        address tokenB;
        uint256 amountA;
        uint256 amountB;
        bool isActive;
        uint256 closedAt;
    }

    #[sol(rpc)]
    #[derive(Debug)]
    contract IEscrow {
        /// Locks `amountA` of `tokenA` (requires a prior allowance) and opens an operation.
        function createOperation(address tokenA, address tokenB, uint256 amountA, uint256 amountB) external;

        /// Pays `amountB` of `tokenB` to the creator and releases `amountA` to the caller.
        function completeOperation(uint256 operationId) external;

        /// Returns the locked `amountA` to the creator.
        function cancelOperation(uint256 operationId) external;

        /// Admin only.
        function addToken(address token) external;

        function getAllowedTokens() external view returns (address[] memory);

        function getAllOperations() external view returns (EscrowOperation[] memory);

        function getOperation(uint256 operationId) external view returns (EscrowOperation memory);
    }

    #[sol(rpc)]
    #[derive(Debug)]
    contract IERC20 {
        function name() external view returns (string memory);
        function symbol() external view returns (string memory);
        function balanceOf(address owner) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
    }
}
